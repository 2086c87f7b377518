//! Test server harness for end-to-end testing
//!
//! Provides `TestGkServer` for spawning a real service front in tests.

use crate::client::{admin_client, biz_client, connect, ConsumerInterceptor};
use crate::client::{TestAdminClient, TestBizClient};
use gk_service::server::{start_with_options, ServeOptions, ServiceHandle, ServiceState};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Listen address used by every test server.
pub const TEST_LISTEN_ADDRESS: &str = "127.0.0.1:0";

/// Test harness for spawning the Gatekeeper service front in end-to-end tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_check_allowed() -> Result<(), anyhow::Error> {
///     let server = TestGkServer::spawn(r#"{"serviceA": ["*"]}"#).await?;
///     let mut biz = server.biz_client("serviceA").await?;
///
///     biz.check(Nothing::default()).await?;
///     Ok(())
/// }
/// ```
pub struct TestGkServer {
    addr: SocketAddr,
    cancel_token: CancellationToken,
    handle: Option<ServiceHandle>,
}

impl TestGkServer {
    /// Spawn a new service front enforcing `acl`.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Serve in the background until dropped or shut down
    pub async fn spawn(acl: &str) -> Result<Self, anyhow::Error> {
        let cancel_token = CancellationToken::new();

        let handle = start_with_options(
            cancel_token.clone(),
            TEST_LISTEN_ADDRESS,
            acl,
            ServeOptions {
                shutdown_grace: Duration::from_secs(1),
            },
        )
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start test server: {}", e))?;

        Ok(Self {
            addr: handle.local_addr(),
            cancel_token,
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Host stamped on audit events produced by this server.
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> Option<ServiceState> {
        self.handle.as_ref().map(ServiceHandle::state)
    }

    /// `Biz` client identifying as `consumer`.
    pub async fn biz_client(&self, consumer: &str) -> Result<TestBizClient, anyhow::Error> {
        let channel = connect(&self.url()).await?;
        Ok(biz_client(channel, ConsumerInterceptor::new(consumer)?))
    }

    /// `Biz` client that sends no `consumer` metadata.
    pub async fn anonymous_biz_client(&self) -> Result<TestBizClient, anyhow::Error> {
        let channel = connect(&self.url()).await?;
        Ok(biz_client(channel, ConsumerInterceptor::anonymous()))
    }

    /// `Admin` client identifying as `consumer`.
    pub async fn admin_client(&self, consumer: &str) -> Result<TestAdminClient, anyhow::Error> {
        let channel = connect(&self.url()).await?;
        Ok(admin_client(channel, ConsumerInterceptor::new(consumer)?))
    }

    /// Cancel the server and wait until it has stopped.
    pub async fn shutdown(mut self) -> Result<(), anyhow::Error> {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle
                .stopped()
                .await
                .map_err(|e| anyhow::anyhow!("Test server did not stop cleanly: {}", e))?;
        }
        Ok(())
    }
}

impl Drop for TestGkServer {
    fn drop(&mut self) {
        // Stops the service front and its background loops
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestGkServer::spawn(r#"{"serviceA": ["*"]}"#).await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));
        assert!(server.addr().ip().is_loopback());
        assert!(server.addr().port() > 0);
        assert_eq!(server.state(), Some(ServiceState::Serving));
        assert_eq!(server.host(), server.addr().to_string());

        Ok(())
    }

    #[tokio::test]
    async fn test_spawn_rejects_malformed_acl() {
        let result = TestGkServer::spawn("{not json").await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_stops_server() -> Result<(), anyhow::Error> {
        let server = TestGkServer::spawn(r#"{"serviceA": ["*"]}"#).await?;

        server.shutdown().await?;

        Ok(())
    }
}
