//! gRPC client helpers.
//!
//! Every client built here sends the same `consumer` metadata on each call,
//! the way a real caller identifies itself to the gatekeeper.

use gk_service::grpc::CONSUMER_METADATA_KEY;
use proto_gen::gatekeeper::admin_client::AdminClient;
use proto_gen::gatekeeper::biz_client::BizClient;
use std::time::Duration;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};

/// Connect timeout for test channels.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// `Biz` client that identifies as a fixed consumer.
pub type TestBizClient = BizClient<InterceptedService<Channel, ConsumerInterceptor>>;

/// `Admin` client that identifies as a fixed consumer.
pub type TestAdminClient = AdminClient<InterceptedService<Channel, ConsumerInterceptor>>;

/// Interceptor attaching `consumer` metadata to outgoing calls.
///
/// `ConsumerInterceptor::anonymous()` sends no identity at all.
#[derive(Debug, Clone)]
pub struct ConsumerInterceptor {
    consumer: Option<MetadataValue<Ascii>>,
}

impl ConsumerInterceptor {
    /// Identify every call as `consumer`.
    pub fn new(consumer: &str) -> Result<Self, anyhow::Error> {
        let value = MetadataValue::try_from(consumer)
            .map_err(|e| anyhow::anyhow!("Invalid consumer metadata {consumer:?}: {e}"))?;
        Ok(Self {
            consumer: Some(value),
        })
    }

    /// Send calls without `consumer` metadata.
    pub fn anonymous() -> Self {
        Self { consumer: None }
    }
}

impl Interceptor for ConsumerInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(consumer) = &self.consumer {
            request
                .metadata_mut()
                .insert(CONSUMER_METADATA_KEY, consumer.clone());
        }
        Ok(request)
    }
}

/// Open a channel to `url` (e.g. `http://127.0.0.1:50051`).
pub async fn connect(url: &str) -> Result<Channel, anyhow::Error> {
    let channel = Endpoint::from_shared(url.to_string())
        .map_err(|e| anyhow::anyhow!("Invalid endpoint {url}: {e}"))?
        .connect_timeout(CONNECT_TIMEOUT)
        .connect()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to {url}: {e}"))?;
    Ok(channel)
}

/// Build a `Biz` client over `channel`.
pub fn biz_client(channel: Channel, interceptor: ConsumerInterceptor) -> TestBizClient {
    BizClient::with_interceptor(channel, interceptor)
}

/// Build an `Admin` client over `channel`.
pub fn admin_client(channel: Channel, interceptor: ConsumerInterceptor) -> TestAdminClient {
    AdminClient::with_interceptor(channel, interceptor)
}
