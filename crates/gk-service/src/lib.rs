//! Gatekeeper Service Library
//!
//! An access-controlled gRPC front for a small business service, with live
//! operational visibility:
//!
//! - Every call is checked against a consumer -> methods access policy
//! - Every authorized call is broadcast as an audit event to log subscribers
//! - Statistics subscribers receive per-interval visit counts by method and
//!   by consumer
//!
//! # Architecture
//!
//! ```text
//! client ──> AclLayer ──> Biz / Admin handlers
//!               │
//!               ├──publish──> Broadcaster<AuditEvent> ──> Admin/Logging streams
//!               └──publish──> Broadcaster<Visit> ──> StatsAggregator ──> Admin/Statistics streams
//! ```
//!
//! # Modules
//!
//! - [`policy`] - Access policy parsing and evaluation
//! - [`grpc`] - ACL layer and the `Biz`/`Admin` services
//! - [`actors`] - Broadcasters and statistics aggregation
//! - [`server`] - Service front lifecycle
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with gRPC status mapping
//! - [`observability`] - Metrics and health endpoints

pub mod actors;
pub mod config;
pub mod errors;
pub mod grpc;
pub mod observability;
pub mod policy;
pub mod server;

pub use errors::GkError;
pub use server::{start, start_with_options, ServeOptions, ServiceHandle, ServiceState};
