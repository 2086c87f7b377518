//! Service front: binds the gRPC listener and runs both services behind the
//! access control layer until cancelled.
//!
//! # Lifecycle
//!
//! ```text
//! Starting ──bind ok──> Serving ──cancel──> Stopping ──drained──> Stopped
//!                          └──────────serve error─────────────────────┘
//! ```
//!
//! The policy is parsed and the listener bound before [`start`] returns, so
//! configuration and bind errors reach the caller directly. Everything after
//! that runs on a background task and is reported through the state channel.

use crate::actors::{AuditEvent, BroadcasterHandle, StreamKind, Visit};
use crate::errors::GkError;
use crate::grpc::{AclLayer, AdminService, BizService};
use crate::policy::AccessPolicy;

use proto_gen::gatekeeper::admin_server::AdminServer;
use proto_gen::gatekeeper::biz_server::BizServer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info, instrument, warn};

/// Default time allowed for in-flight calls after cancellation.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle state of the service front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Policy parsed, listener not yet serving.
    Starting,
    /// Accepting calls.
    Serving,
    /// Cancelled; draining in-flight calls.
    Stopping,
    /// Terminal.
    Stopped,
}

impl ServiceState {
    /// Returns the state as a string for logging.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Starting => "starting",
            ServiceState::Serving => "serving",
            ServiceState::Stopping => "stopping",
            ServiceState::Stopped => "stopped",
        }
    }
}

/// Options for [`start_with_options`].
#[derive(Debug, Clone, Copy)]
pub struct ServeOptions {
    /// How long open calls may keep running once cancellation fired.
    pub shutdown_grace: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Handle to a running service front.
#[derive(Debug)]
pub struct ServiceHandle {
    local_addr: SocketAddr,
    state: watch::Receiver<ServiceState>,
    task: JoinHandle<()>,
}

impl ServiceHandle {
    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServiceState {
        *self.state.borrow()
    }

    /// Subscribe to lifecycle changes (used by the health endpoints).
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ServiceState> {
        self.state.clone()
    }

    /// Wait until the service front has stopped.
    ///
    /// # Errors
    ///
    /// Returns [`GkError::Internal`] if the serving task panicked.
    pub async fn stopped(self) -> Result<(), GkError> {
        self.task
            .await
            .map_err(|e| GkError::Internal(format!("Service task failed: {e}")))
    }
}

/// Start the service front with default options.
///
/// # Errors
///
/// - [`GkError::Policy`] if `policy_document` is malformed (nothing is bound)
/// - [`GkError::Bind`] if `listen_address` cannot be bound
pub async fn start(
    cancel_token: CancellationToken,
    listen_address: &str,
    policy_document: &str,
) -> Result<ServiceHandle, GkError> {
    start_with_options(
        cancel_token,
        listen_address,
        policy_document,
        ServeOptions::default(),
    )
    .await
}

/// Start the service front.
///
/// Every audit event carries the bound address (with the resolved port when
/// `listen_address` asks for port 0) as its host.
///
/// # Errors
///
/// - [`GkError::Policy`] if `policy_document` is malformed (nothing is bound)
/// - [`GkError::Bind`] if `listen_address` cannot be bound
#[instrument(skip_all, name = "gk.service.start", fields(listen_address = %listen_address))]
pub async fn start_with_options(
    cancel_token: CancellationToken,
    listen_address: &str,
    policy_document: &str,
    options: ServeOptions,
) -> Result<ServiceHandle, GkError> {
    let (state_tx, state_rx) = watch::channel(ServiceState::Starting);

    let policy = Arc::new(AccessPolicy::from_json(policy_document)?);

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|source| GkError::Bind {
            addr: listen_address.to_string(),
            source,
        })?;
    let local_addr = listener.local_addr().map_err(|source| GkError::Bind {
        addr: listen_address.to_string(),
        source,
    })?;

    info!(
        target: "gk.service",
        listen_address = %listen_address,
        local_addr = %local_addr,
        consumers = policy.consumer_count(),
        "gRPC listener bound"
    );

    // Background loops stop with the caller's token or when serving ends
    let actors_token = cancel_token.child_token();
    let (events, events_task) =
        BroadcasterHandle::<AuditEvent>::spawn(StreamKind::Events, actors_token.clone());
    let (visits, visits_task) =
        BroadcasterHandle::<Visit>::spawn(StreamKind::Visits, actors_token.clone());

    let acl = AclLayer::new(
        policy,
        events.clone(),
        visits.clone(),
        local_addr.to_string(),
    );
    let admin = AdminService::new(events, visits, actors_token.clone());

    let router = Server::builder()
        .layer(acl)
        .add_service(BizServer::new(BizService::new()))
        .add_service(AdminServer::new(admin));

    state_tx.send_replace(ServiceState::Serving);

    let task = tokio::spawn(async move {
        let shutdown_token = cancel_token.clone();
        let state = state_tx.clone();
        let shutdown = async move {
            shutdown_token.cancelled().await;
            state.send_replace(ServiceState::Stopping);
            info!(
                target: "gk.service",
                state = ServiceState::Stopping.as_str(),
                "Service front stopping"
            );
        };

        let serve = router.serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown);
        let grace_expired = async {
            cancel_token.cancelled().await;
            tokio::time::sleep(options.shutdown_grace).await;
        };

        tokio::select! {
            result = serve => {
                if let Err(e) = result {
                    error!(target: "gk.service", error = %e, "gRPC server failed");
                }
            }
            () = grace_expired => {
                warn!(
                    target: "gk.service",
                    grace_secs = options.shutdown_grace.as_secs(),
                    "Shutdown grace expired with calls still open"
                );
            }
        }

        actors_token.cancel();
        for task in [events_task, visits_task] {
            if let Err(e) = task.await {
                warn!(target: "gk.service", error = %e, "Broadcaster task failed");
            }
        }

        state_tx.send_replace(ServiceState::Stopped);
        info!(
            target: "gk.service",
            state = ServiceState::Stopped.as_str(),
            "Service front stopped"
        );
    });

    Ok(ServiceHandle {
        local_addr,
        state: state_rx,
        task,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    const ACL: &str = r#"{"serviceA": ["*"]}"#;

    #[tokio::test]
    async fn test_malformed_policy_fails_before_bind() {
        // Binding first would fail here with a bind error instead
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap().to_string();

        let result = start(CancellationToken::new(), &addr, "not json").await;

        assert!(matches!(result, Err(GkError::Policy(_))));
    }

    #[tokio::test]
    async fn test_bind_failure_is_returned() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap().to_string();

        let result = start(CancellationToken::new(), &addr, ACL).await;

        match result {
            Err(GkError::Bind { addr: failed, .. }) => assert_eq!(failed, addr),
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_serving_then_stopped() {
        let cancel_token = CancellationToken::new();
        let handle = start(cancel_token.clone(), "127.0.0.1:0", ACL).await.unwrap();

        assert_eq!(handle.state(), ServiceState::Serving);
        assert_ne!(handle.local_addr().port(), 0);

        let mut states = handle.state_receiver();
        cancel_token.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle.stopped())
            .await
            .expect("service should stop after cancellation")
            .unwrap();

        assert_eq!(*states.borrow_and_update(), ServiceState::Stopped);
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ServiceState::Starting.as_str(), "starting");
        assert_eq!(ServiceState::Serving.as_str(), "serving");
        assert_eq!(ServiceState::Stopping.as_str(), "stopping");
        assert_eq!(ServiceState::Stopped.as_str(), "stopped");
        assert_eq!(
            ServeOptions::default().shutdown_grace,
            DEFAULT_SHUTDOWN_GRACE
        );
    }
}
