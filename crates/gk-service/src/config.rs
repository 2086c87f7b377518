//! Gatekeeper configuration.
//!
//! Configuration is loaded from environment variables. The access policy
//! document is redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default gRPC bind address.
pub const DEFAULT_GRPC_BIND_ADDRESS: &str = "127.0.0.1:8082";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default shutdown grace period in seconds.
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 5;

/// Gatekeeper configuration.
#[derive(Clone)]
pub struct Config {
    /// JSON access policy document (`GK_ACL`).
    pub acl: String,

    /// gRPC listen address (default: "127.0.0.1:8082"). The bound address is
    /// stamped on audit events as their host.
    pub grpc_bind_address: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Time allowed for open calls after shutdown starts (default: 5s).
    pub shutdown_grace: Duration,
}

/// Custom Debug implementation that redacts the policy document.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("acl", &"[REDACTED]")
            .field("grpc_bind_address", &self.grpc_bind_address)
            .field("health_bind_address", &self.health_bind_address)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let acl = vars
            .get("GK_ACL")
            .ok_or_else(|| ConfigError::MissingEnvVar("GK_ACL".to_string()))?
            .clone();

        let grpc_bind_address = vars
            .get("GK_GRPC_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_GRPC_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("GK_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let shutdown_grace_seconds = match vars.get("GK_SHUTDOWN_GRACE_SECONDS") {
            Some(value) => value.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "GK_SHUTDOWN_GRACE_SECONDS must be a non-negative integer: {e}"
                ))
            })?,
            None => DEFAULT_SHUTDOWN_GRACE_SECONDS,
        };

        Ok(Config {
            acl,
            grpc_bind_address,
            health_bind_address,
            shutdown_grace: Duration::from_secs(shutdown_grace_seconds),
        })
    }
}
