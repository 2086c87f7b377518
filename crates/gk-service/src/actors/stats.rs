//! `StatsAggregator` - per-subscription visit counting with periodic flush.
//!
//! Each `Statistics` call owns one aggregator. The aggregator subscribes to
//! the visit broadcaster like any other subscriber, counts visits by method
//! and by consumer, and on every tick hands the snapshot to its sink and
//! starts over with an empty one.
//!
//! The accumulator is private to the aggregator task; nothing else reads it.

use crate::errors::GkError;
use crate::observability::metrics;

use super::broadcaster::Subscription;
use super::messages::{StatsSnapshot, Visit};

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Validate a caller-supplied interval.
///
/// # Errors
///
/// Returns [`GkError::InvalidInterval`] for zero.
pub fn window_from_seconds(interval_seconds: u64) -> Result<Duration, GkError> {
    if interval_seconds == 0 {
        return Err(GkError::InvalidInterval(interval_seconds));
    }
    Ok(Duration::from_secs(interval_seconds))
}

/// Aggregator for one statistics subscription.
pub struct StatsAggregator {
    subscriber_id: u64,
    window: Duration,
    visits: mpsc::Receiver<Visit>,
    sink: mpsc::Sender<StatsSnapshot>,
    snapshot: StatsSnapshot,
    cancel_token: CancellationToken,
}

impl StatsAggregator {
    /// Create an aggregator over a visit subscription (not started).
    #[must_use]
    pub fn new(
        window: Duration,
        subscription: Subscription<Visit>,
        sink: mpsc::Sender<StatsSnapshot>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            subscriber_id: subscription.id,
            window,
            visits: subscription.receiver,
            sink,
            snapshot: StatsSnapshot::default(),
            cancel_token,
        }
    }

    /// Run until cancelled, the sink closes, or the visit stream ends.
    ///
    /// The first snapshot is emitted one full window after start.
    #[instrument(skip_all, name = "gk.actor.stats", fields(subscriber_id = self.subscriber_id))]
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.window, self.window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            target: "gk.actor.stats",
            subscriber_id = self.subscriber_id,
            window_secs = self.window.as_secs(),
            "Statistics aggregator started"
        );

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => break,

                () = self.sink.closed() => {
                    debug!(
                        target: "gk.actor.stats",
                        subscriber_id = self.subscriber_id,
                        "Statistics subscriber disconnected"
                    );
                    break;
                }

                _ = ticker.tick() => {
                    if !self.flush().await {
                        break;
                    }
                }

                visit = self.visits.recv() => {
                    match visit {
                        Some(visit) => self.snapshot.record(&visit),
                        None => break,
                    }
                }
            }
        }

        debug!(
            target: "gk.actor.stats",
            subscriber_id = self.subscriber_id,
            "Statistics aggregator stopped"
        );
    }

    /// Emit the current snapshot and reset. Returns `false` if the loop should stop.
    async fn flush(&mut self) -> bool {
        let snapshot = std::mem::take(&mut self.snapshot);

        tokio::select! {
            biased;

            () = self.cancel_token.cancelled() => false,

            result = self.sink.send(snapshot) => {
                if result.is_ok() {
                    metrics::record_snapshot_emitted();
                }
                result.is_ok()
            }
        }
    }
}
