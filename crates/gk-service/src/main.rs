//! Gatekeeper
//!
//! ACL-gated gRPC front with live audit log and statistics streams.
//!
//! # Servers
//!
//! - gRPC server for `Biz` and `Admin` (default: 127.0.0.1:8082)
//! - HTTP server for health endpoints and metrics (default: 0.0.0.0:8081)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Start the service front (policy parse, bind, background loops)
//! 4. Start health HTTP server (liveness, readiness, metrics)
//! 5. Wait for shutdown signal, then cancel and wait for the front to stop

#![warn(clippy::pedantic)]

use std::net::SocketAddr;

use axum::Router;
use gk_service::config::Config;
use gk_service::errors::GkError;
use gk_service::observability::{health_router, metrics::init_metrics_recorder};
use gk_service::server::{start_with_options, ServeOptions};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gk_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(target: "gk.service", "Starting Gatekeeper");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!(target: "gk.service", "Failed to load configuration: {}", e);
        e
    })?;

    info!(
        target: "gk.service",
        grpc_bind_address = %config.grpc_bind_address,
        health_bind_address = %config.health_bind_address,
        shutdown_grace_secs = config.shutdown_grace.as_secs(),
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(target: "gk.service", error = %e, "Failed to install Prometheus metrics recorder");
        GkError::Internal(e)
    })?;

    let shutdown_token = CancellationToken::new();

    let service = start_with_options(
        shutdown_token.child_token(),
        &config.grpc_bind_address,
        &config.acl,
        ServeOptions {
            shutdown_grace: config.shutdown_grace,
        },
    )
    .await
    .map_err(|e| {
        error!(target: "gk.service", error = %e, "Failed to start service front");
        e
    })?;
    info!(target: "gk.service", addr = %service.local_addr(), "gRPC server started");

    // Start health HTTP server (MUST succeed - fail startup if it doesn't)
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(
            target: "gk.service",
            error = %e,
            addr = %config.health_bind_address,
            "Invalid health bind address"
        );
        GkError::Config(format!("Invalid health bind address: {e}"))
    })?;

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let app = health_router(service.state_receiver()).merge(metrics_router);

    // Bind listener BEFORE spawning to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|source| {
            error!(
                target: "gk.service",
                error = %source,
                addr = %health_addr,
                "Failed to bind health server"
            );
            GkError::Bind {
                addr: health_addr.to_string(),
                source,
            }
        })?;

    let health_shutdown_token = shutdown_token.child_token();
    let health_task = tokio::spawn(async move {
        info!(target: "gk.service", addr = %health_addr, "Health server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!(target: "gk.service", "Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(target: "gk.service", error = %e, "Health server failed");
        }
    });

    info!(target: "gk.service", "Gatekeeper running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!(target: "gk.service", "Shutdown signal received, initiating graceful shutdown...");
    shutdown_token.cancel();

    service.stopped().await?;
    if let Err(e) = health_task.await {
        error!(target: "gk.service", error = %e, "Health server task failed");
    }

    info!(target: "gk.service", "Gatekeeper shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
