//! gRPC surface of the service front.
//!
//! [`acl_layer::AclLayer`] wraps both services so unary and streaming calls
//! go through the same access check.

pub mod acl_layer;
pub mod admin_service;
pub mod biz_service;

pub use acl_layer::{AclLayer, DenyReason, CONSUMER_METADATA_KEY};
pub use admin_service::AdminService;
pub use biz_service::BizService;
