//! Protocol Buffer messages and gRPC service stubs for Gatekeeper.
//!
//! Two services share the `gatekeeper` package:
//!
//! - `Biz` - the business service (`Check`, `Add`, `Test`)
//! - `Admin` - audit log and statistics streams (`Logging`, `Statistics`)
//!
//! Routes take the form `/gatekeeper.<Service>/<Method>`.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)] // Generated code has various doc formatting

// Re-export prost traits for convenience
pub use prost::Message;

pub mod gatekeeper {
    //! Gatekeeper wire messages and services.

    use std::collections::HashMap;

    /// Empty request/response for business calls.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Nothing {
        #[prost(bool, tag = "1")]
        pub dummy: bool,
    }

    /// One authorized call, as delivered to log subscribers.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Event {
        /// Unix seconds when the call was authorized.
        #[prost(int64, tag = "1")]
        pub timestamp: i64,
        #[prost(string, tag = "2")]
        pub consumer: String,
        /// Full method path, e.g. `/gatekeeper.Biz/Check`.
        #[prost(string, tag = "3")]
        pub method: String,
        /// Address the service is bound to.
        #[prost(string, tag = "4")]
        pub host: String,
    }

    /// Visit counts for one statistics window.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Stat {
        /// Unix seconds when the window was flushed.
        #[prost(int64, tag = "1")]
        pub timestamp: i64,
        #[prost(map = "string, uint64", tag = "2")]
        pub by_method: HashMap<String, u64>,
        #[prost(map = "string, uint64", tag = "3")]
        pub by_consumer: HashMap<String, u64>,
    }

    /// Statistics subscription parameters.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StatInterval {
        #[prost(uint64, tag = "1")]
        pub interval_seconds: u64,
    }

    include!(concat!(env!("OUT_DIR"), "/gatekeeper.Biz.rs"));
    include!(concat!(env!("OUT_DIR"), "/gatekeeper.Admin.rs"));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::gatekeeper::{Event, Stat};
    use super::Message;

    #[test]
    fn test_event_wire_encoding_preserves_fields() {
        let event = Event {
            timestamp: 1_700_000_000,
            consumer: "logger".to_string(),
            method: "/gatekeeper.Biz/Check".to_string(),
            host: "127.0.0.1:8082".to_string(),
        };

        let bytes = event.encode_to_vec();
        let decoded = Event::decode(bytes.as_slice()).unwrap();

        assert_eq!(decoded, event);
    }

    #[test]
    fn test_empty_stat_encodes_to_timestamp_only() {
        let stat = Stat {
            timestamp: 0,
            ..Default::default()
        };

        // proto3 omits default scalars and empty maps
        assert!(stat.encode_to_vec().is_empty());
    }
}
