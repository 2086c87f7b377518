//! gRPC access control layer.
//!
//! Every call, unary or streaming, passes through [`AclService`] before
//! reaching a handler. The layer reads the caller's identity from the
//! `consumer` metadata, checks it against the [`AccessPolicy`] and, when the
//! call is allowed, publishes one [`AuditEvent`] and then one [`Visit`]
//! before handing the request on. Streaming calls are checked once, at
//! establishment.
//!
//! # Security
//!
//! - Every denial returns `UNAUTHENTICATED` with the same generic message
//! - The specific reason is logged at debug level and counted in
//!   `gk_authz_decisions_total`, never sent to the caller
//! - Denied calls publish nothing and never reach the handler

use crate::actors::{AuditEvent, BroadcasterHandle, StreamKind, Visit};
use crate::errors::GkError;
use crate::observability::metrics;
use crate::policy::AccessPolicy;

use axum::http::{self, HeaderMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::body::BoxBody;
use tonic::Status;
use tower::{Layer, Service};
use tracing::{debug, instrument, warn};

/// Metadata key carrying the caller's identity.
pub const CONSUMER_METADATA_KEY: &str = "consumer";

/// Why a call was refused. Only used for logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No `consumer` metadata on the call.
    MissingConsumer,
    /// `consumer` metadata is not printable ASCII.
    InvalidConsumer,
    /// Identity is not named in the policy.
    UnknownConsumer,
    /// Identity is known but the method is not granted to it.
    MethodNotPermitted,
}

impl DenyReason {
    /// Returns the reason as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingConsumer => "missing_consumer",
            DenyReason::InvalidConsumer => "invalid_consumer",
            DenyReason::UnknownConsumer => "unknown_consumer",
            DenyReason::MethodNotPermitted => "method_not_permitted",
        }
    }
}

/// Decide whether a call may proceed and return the caller's identity.
///
/// Uses the first `consumer` value when several are present. A value that
/// is not valid ASCII text counts as absent.
///
/// # Errors
///
/// Returns the [`DenyReason`] when the call must be refused.
pub fn check_call(
    policy: &AccessPolicy,
    headers: &HeaderMap,
    method: &str,
) -> Result<String, DenyReason> {
    let value = headers
        .get(CONSUMER_METADATA_KEY)
        .ok_or(DenyReason::MissingConsumer)?;
    let consumer = value.to_str().map_err(|_| DenyReason::InvalidConsumer)?;

    if policy.authorize(consumer, method) {
        return Ok(consumer.to_string());
    }

    if policy.contains_consumer(consumer) {
        Err(DenyReason::MethodNotPermitted)
    } else {
        Err(DenyReason::UnknownConsumer)
    }
}

/// State shared by every clone of the layer and its services.
#[derive(Debug)]
struct AclState {
    policy: Arc<AccessPolicy>,
    events: BroadcasterHandle<AuditEvent>,
    visits: BroadcasterHandle<Visit>,
    host: String,
}

impl AclState {
    /// Run the access check and publish the call's records.
    ///
    /// Returns the response to send instead of calling the handler when the
    /// call must not proceed.
    #[instrument(skip_all, name = "gk.grpc.acl", fields(method = %method))]
    async fn admit(&self, headers: &HeaderMap, method: &str) -> Result<(), Status> {
        let consumer = match check_call(&self.policy, headers, method) {
            Ok(consumer) => consumer,
            Err(reason) => {
                debug!(
                    target: "gk.grpc.acl",
                    method = %method,
                    reason = reason.as_str(),
                    "Call denied"
                );
                metrics::record_authz_decision("denied", reason.as_str());
                return Err(Status::unauthenticated("Access denied"));
            }
        };

        metrics::record_authz_decision("allowed", "granted");
        debug!(
            target: "gk.grpc.acl",
            method = %method,
            consumer = %consumer,
            "Call allowed"
        );

        let event = AuditEvent::now(consumer.clone(), method, self.host.clone());
        let visit = Visit {
            method: method.to_string(),
            consumer,
        };

        self.events
            .publish(event)
            .await
            .map_err(|e| record_failed(self.events.kind(), method, e))?;
        self.visits
            .publish(visit)
            .await
            .map_err(|e| record_failed(self.visits.kind(), method, e))
    }
}

fn record_failed(stream: StreamKind, method: &str, err: GkError) -> Status {
    warn!(
        target: "gk.grpc.acl",
        stream = stream.as_str(),
        method = %method,
        error = %err,
        "Could not record call"
    );
    Status::from(err)
}

/// Tower layer enforcing the access policy on every gRPC call.
#[derive(Debug, Clone)]
pub struct AclLayer {
    state: Arc<AclState>,
}

impl AclLayer {
    /// Create the layer.
    ///
    /// `host` is the address the service front is bound to; it is stamped on
    /// every audit event.
    pub fn new(
        policy: Arc<AccessPolicy>,
        events: BroadcasterHandle<AuditEvent>,
        visits: BroadcasterHandle<Visit>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            state: Arc::new(AclState {
                policy,
                events,
                visits,
                host: host.into(),
            }),
        }
    }
}

impl<S> Layer<S> for AclLayer {
    type Service = AclService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AclService {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Tower service produced by [`AclLayer`].
#[derive(Debug, Clone)]
pub struct AclService<S> {
    inner: S,
    state: Arc<AclState>,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for AclService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<BoxBody>>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        // The clone may not be ready; keep the one that was polled
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let state = self.state.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            if let Err(status) = state.admit(&parts.headers, parts.uri.path()).await {
                return Ok(status.into_http());
            }

            inner.call(http::Request::from_parts(parts, body)).await
        })
    }
}
