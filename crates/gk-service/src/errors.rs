//! Gatekeeper error types.
//!
//! Errors map to gRPC `Status` codes for client responses. Internal details
//! are logged server-side but not exposed to clients.

use crate::policy::PolicyError;
use thiserror::Error;
use tonic::Status;

/// Gatekeeper error type.
///
/// Maps to gRPC status codes:
/// - `InvalidInterval`: `INVALID_ARGUMENT`
/// - `ShuttingDown`: `UNAVAILABLE`
/// - `Policy`, `Config`, `Bind`, `Internal`: `INTERNAL`
#[derive(Debug, Error)]
pub enum GkError {
    /// Access policy document could not be parsed.
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// gRPC listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Statistics interval must be at least one second.
    #[error("Invalid statistics interval: {0}")]
    InvalidInterval(u64),

    /// A background loop has stopped (cancellation in progress).
    #[error("Service is shutting down")]
    ShuttingDown,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GkError {
    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            GkError::Policy(_)
            | GkError::Config(_)
            | GkError::Bind { .. }
            | GkError::Internal(_) => "An internal error occurred".to_string(),
            GkError::InvalidInterval(_) => "interval_seconds must be greater than zero".to_string(),
            GkError::ShuttingDown => "Service is shutting down".to_string(),
        }
    }
}

impl From<GkError> for Status {
    fn from(err: GkError) -> Self {
        let message = err.client_message();
        match err {
            GkError::InvalidInterval(_) => Status::invalid_argument(message),
            GkError::ShuttingDown => Status::unavailable(message),
            GkError::Policy(_)
            | GkError::Config(_)
            | GkError::Bind { .. }
            | GkError::Internal(_) => Status::internal(message),
        }
    }
}
