//! # Gatekeeper Test Utilities
//!
//! Shared test utilities for the Gatekeeper service.
//!
//! This crate provides:
//! - Server test harness (`TestGkServer` for end-to-end tests)
//! - Client helpers that attach `consumer` metadata to every call
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gk_test_utils::*;
//! use proto_gen::gatekeeper::Nothing;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestGkServer::spawn(r#"{"biz_user": ["/gatekeeper.Biz/Check"]}"#).await?;
//!     let mut biz = server.biz_client("biz_user").await?;
//!
//!     biz.check(Nothing::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod server_harness;

// Re-export commonly used items
pub use client::*;
pub use server_harness::*;
