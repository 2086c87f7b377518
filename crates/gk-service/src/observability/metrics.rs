//! Metrics definitions for Gatekeeper.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gk_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded; consumer identities and method names are never used
//! as labels:
//! - `decision`: 2 values (allowed, denied)
//! - `reason`: 5 values (`granted` plus each
//!   [`DenyReason`](crate::grpc::acl_layer::DenyReason))
//! - `stream`: 2 values (events, visits)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Fan-out rounds are in-process channel handoffs unless a subscriber stalls
        .set_buckets_for_metric(
            Matcher::Prefix("gk_fanout".to_string()),
            &[
                0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set fan-out buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Authorization
// ============================================================================

/// Record one ACL decision.
///
/// Metric: `gk_authz_decisions_total`
/// Labels: `decision` (allowed, denied), `reason`
pub fn record_authz_decision(decision: &'static str, reason: &'static str) {
    counter!("gk_authz_decisions_total", "decision" => decision, "reason" => reason).increment(1);
}

// ============================================================================
// Broadcast
// ============================================================================

/// Set the number of registered subscribers on a stream.
///
/// Metric: `gk_subscribers_active`
/// Labels: `stream` (events, visits)
pub fn set_subscribers_active(stream: &'static str, count: usize) {
    // usize to f64 conversion is safe for realistic subscriber counts
    #[allow(clippy::cast_precision_loss)]
    gauge!("gk_subscribers_active", "stream" => stream).set(count as f64);
}

/// Record how long one fan-out round took.
///
/// Metric: `gk_fanout_duration_seconds`
/// Labels: `stream`
///
/// Long rounds mean a subscriber is not keeping up.
pub fn record_fanout_duration(stream: &'static str, duration: Duration) {
    histogram!("gk_fanout_duration_seconds", "stream" => stream).record(duration.as_secs_f64());
}

// ============================================================================
// Statistics
// ============================================================================

/// Record one statistics snapshot delivered to a subscriber.
///
/// Metric: `gk_stats_snapshots_emitted_total`
pub fn record_snapshot_emitted() {
    counter!("gk_stats_snapshots_emitted_total").increment(1);
}
