//! Health endpoints for Gatekeeper.
//!
//! Provides Kubernetes-compatible health endpoints:
//! - `GET /health` - Liveness probe (is the process running?)
//! - `GET /ready` - Readiness probe (can we serve traffic?)
//!
//! Both read the service front's lifecycle state:
//!
//! | State    | `/health` | `/ready` |
//! |----------|-----------|----------|
//! | Starting | 200       | 503      |
//! | Serving  | 200       | 200      |
//! | Stopping | 200       | 503      |
//! | Stopped  | 503       | 503      |
//!
//! Note: The `/metrics` endpoint is served separately via `metrics-exporter-prometheus`.

use crate::server::ServiceState;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use tokio::sync::watch;

/// Create the health router with liveness and readiness endpoints.
///
/// # Arguments
///
/// * `state` - Lifecycle state published by the service front
pub fn health_router(state: watch::Receiver<ServiceState>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(state)
}

/// Liveness probe handler.
async fn liveness_handler(State(state): State<watch::Receiver<ServiceState>>) -> StatusCode {
    if *state.borrow() == ServiceState::Stopped {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// Readiness probe handler.
async fn readiness_handler(State(state): State<watch::Receiver<ServiceState>>) -> StatusCode {
    if *state.borrow() == ServiceState::Serving {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
