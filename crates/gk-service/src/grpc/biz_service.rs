//! `Biz` gRPC service.
//!
//! The business calls carry no payload. Access control, audit and visit
//! accounting all happen in the [`AclLayer`](super::acl_layer::AclLayer) in
//! front of this service, so by the time a handler runs the call has already
//! been authorized and recorded.

use proto_gen::gatekeeper::biz_server::Biz;
use proto_gen::gatekeeper::Nothing;
use tonic::{Request, Response, Status};
use tracing::{instrument, trace};

/// Pass-through implementation of the business service.
#[derive(Debug, Clone, Default)]
pub struct BizService;

impl BizService {
    /// Create a new business service.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[tonic::async_trait]
impl Biz for BizService {
    #[instrument(skip_all, name = "gk.grpc.biz.check")]
    async fn check(&self, _request: Request<Nothing>) -> Result<Response<Nothing>, Status> {
        trace!(target: "gk.grpc.biz", "Check");
        Ok(Response::new(Nothing::default()))
    }

    #[instrument(skip_all, name = "gk.grpc.biz.add")]
    async fn add(&self, _request: Request<Nothing>) -> Result<Response<Nothing>, Status> {
        trace!(target: "gk.grpc.biz", "Add");
        Ok(Response::new(Nothing::default()))
    }

    #[instrument(skip_all, name = "gk.grpc.biz.test")]
    async fn test(&self, _request: Request<Nothing>) -> Result<Response<Nothing>, Status> {
        trace!(target: "gk.grpc.biz", "Test");
        Ok(Response::new(Nothing::default()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_calls_reply_with_nothing() {
        let service = BizService::new();

        let reply = service
            .check(Request::new(Nothing { dummy: true }))
            .await
            .unwrap();
        assert_eq!(reply.into_inner(), Nothing::default());

        let reply = service.add(Request::new(Nothing { dummy: true })).await.unwrap();
        assert_eq!(reply.into_inner(), Nothing::default());

        let reply = service.test(Request::new(Nothing::default())).await.unwrap();
        assert_eq!(reply.into_inner(), Nothing::default());
    }
}
