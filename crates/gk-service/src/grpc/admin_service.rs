//! `Admin` gRPC service: live audit log and statistics streams.
//!
//! - `Logging` registers the caller with the event broadcaster and streams
//!   every audit event published after registration.
//! - `Statistics` starts a private [`StatsAggregator`] fed by the visit
//!   broadcaster and streams one snapshot per interval.
//!
//! A stream ends when the caller goes away or when the service shuts down.
//! Either way the broadcaster drops the subscriber on its next round.

use crate::actors::{
    window_from_seconds, AuditEvent, BroadcasterHandle, StatsAggregator, Visit, HANDOFF_CAPACITY,
};

use proto_gen::gatekeeper::admin_server::Admin;
use proto_gen::gatekeeper::{Event, Nothing, Stat, StatInterval};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{info, instrument};

/// Boxed server stream used for both admin calls.
pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Admin service implementation.
#[derive(Debug, Clone)]
pub struct AdminService {
    events: BroadcasterHandle<AuditEvent>,
    visits: BroadcasterHandle<Visit>,
    cancel_token: CancellationToken,
}

impl AdminService {
    /// Create the service over the shared broadcasters.
    ///
    /// Statistics aggregators are stopped through child tokens of
    /// `cancel_token`.
    #[must_use]
    pub fn new(
        events: BroadcasterHandle<AuditEvent>,
        visits: BroadcasterHandle<Visit>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            events,
            visits,
            cancel_token,
        }
    }
}

#[tonic::async_trait]
impl Admin for AdminService {
    type LoggingStream = ResponseStream<Event>;
    type StatisticsStream = ResponseStream<Stat>;

    #[instrument(skip_all, name = "gk.grpc.admin.logging")]
    async fn logging(
        &self,
        _request: Request<Nothing>,
    ) -> Result<Response<Self::LoggingStream>, Status> {
        let subscription = self.events.subscribe().await?;

        info!(
            target: "gk.grpc.admin",
            subscriber_id = subscription.id,
            "Log subscriber registered"
        );

        let stream = ReceiverStream::new(subscription.receiver).map(|event| Ok(Event::from(event)));

        Ok(Response::new(Box::pin(stream)))
    }

    #[instrument(skip_all, name = "gk.grpc.admin.statistics")]
    async fn statistics(
        &self,
        request: Request<StatInterval>,
    ) -> Result<Response<Self::StatisticsStream>, Status> {
        let interval_seconds = request.into_inner().interval_seconds;
        let window = window_from_seconds(interval_seconds)?;

        let subscription = self.visits.subscribe().await?;
        let subscriber_id = subscription.id;

        let (sink, snapshots) = mpsc::channel(HANDOFF_CAPACITY);
        let aggregator =
            StatsAggregator::new(window, subscription, sink, self.cancel_token.child_token());
        tokio::spawn(aggregator.run());

        info!(
            target: "gk.grpc.admin",
            subscriber_id,
            interval_seconds,
            "Statistics subscriber registered"
        );

        let stream = ReceiverStream::new(snapshots)
            .map(|snapshot| Ok(snapshot.into_stat(chrono::Utc::now().timestamp())));

        Ok(Response::new(Box::pin(stream)))
    }
}
