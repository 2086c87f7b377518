//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via
//! `tokio::sync::mpsc`. Subscription requests use `tokio::sync::oneshot` so
//! the caller knows it is registered before it starts reading.

use proto_gen::gatekeeper::{Event, Stat};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

/// Capacity of every intake and subscriber channel.
///
/// One slot is the closest tokio gets to an unbuffered handoff: a publisher
/// waits until the receiving loop has taken the previous item.
pub const HANDOFF_CAPACITY: usize = 1;

/// Which broadcast stream an actor serves. Used for logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Audit events for log subscribers.
    Events,
    /// Visit records for statistics aggregators.
    Visits,
}

impl StreamKind {
    /// Returns the stream kind as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Events => "events",
            StreamKind::Visits => "visits",
        }
    }
}

/// Record of one authorized call, delivered to every log subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Unix seconds when the call was authorized.
    pub timestamp: i64,
    pub consumer: String,
    /// Full method path, e.g. `/gatekeeper.Biz/Check`.
    pub method: String,
    /// Address the service front is bound to.
    pub host: String,
}

impl AuditEvent {
    /// Create an event stamped with the current time.
    pub fn now(
        consumer: impl Into<String>,
        method: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            consumer: consumer.into(),
            method: method.into(),
            host: host.into(),
        }
    }
}

impl From<AuditEvent> for Event {
    fn from(event: AuditEvent) -> Self {
        Event {
            timestamp: event.timestamp,
            consumer: event.consumer,
            method: event.method,
            host: event.host,
        }
    }
}

/// Record of one authorized call, fed to statistics aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub method: String,
    pub consumer: String,
}

/// Visit counts accumulated over one statistics window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub by_method: HashMap<String, u64>,
    pub by_consumer: HashMap<String, u64>,
}

impl StatsSnapshot {
    /// Count one visit.
    pub fn record(&mut self, visit: &Visit) {
        *self.by_method.entry(visit.method.clone()).or_insert(0) += 1;
        *self.by_consumer.entry(visit.consumer.clone()).or_insert(0) += 1;
    }

    /// True if no visits were recorded in this window.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_method.is_empty() && self.by_consumer.is_empty()
    }

    /// Convert to the wire message, stamped with `timestamp`.
    #[must_use]
    pub fn into_stat(self, timestamp: i64) -> Stat {
        Stat {
            timestamp,
            by_method: self.by_method,
            by_consumer: self.by_consumer,
        }
    }
}

/// Messages sent to a `Broadcaster`.
///
/// Publications and registrations share one intake so the actor sees them in
/// the order they were sent.
#[derive(Debug)]
pub enum BroadcasterMessage<T> {
    /// Deliver an item to every current subscriber.
    Publish(T),

    /// Join the subscriber set.
    Subscribe {
        /// Channel the broadcaster will deliver items into.
        subscriber: mpsc::Sender<T>,
        /// Receives the subscriber id once registered.
        respond_to: oneshot::Sender<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit(method: &str, consumer: &str) -> Visit {
        Visit {
            method: method.to_string(),
            consumer: consumer.to_string(),
        }
    }

    #[test]
    fn test_stream_kind_labels() {
        assert_eq!(StreamKind::Events.as_str(), "events");
        assert_eq!(StreamKind::Visits.as_str(), "visits");
    }

    #[test]
    fn test_snapshot_counts_by_method_and_consumer() {
        let mut snapshot = StatsSnapshot::default();
        assert!(snapshot.is_empty());

        snapshot.record(&visit("m1", "c1"));
        snapshot.record(&visit("m2", "c1"));
        snapshot.record(&visit("m1", "c2"));

        assert_eq!(
            snapshot.by_method,
            HashMap::from([("m1".to_string(), 2), ("m2".to_string(), 1)])
        );
        assert_eq!(
            snapshot.by_consumer,
            HashMap::from([("c1".to_string(), 2), ("c2".to_string(), 1)])
        );
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_snapshot_into_stat() {
        let mut snapshot = StatsSnapshot::default();
        snapshot.record(&visit("/gatekeeper.Biz/Check", "biz_user"));

        let stat = snapshot.into_stat(42);

        assert_eq!(stat.timestamp, 42);
        assert_eq!(stat.by_method.get("/gatekeeper.Biz/Check"), Some(&1));
        assert_eq!(stat.by_consumer.get("biz_user"), Some(&1));
    }

    #[test]
    fn test_audit_event_into_wire_event() {
        let event = AuditEvent::now("logger", "/gatekeeper.Admin/Logging", "127.0.0.1:8082");
        let timestamp = event.timestamp;

        let wire: Event = event.into();

        assert_eq!(wire.consumer, "logger");
        assert_eq!(wire.method, "/gatekeeper.Admin/Logging");
        assert_eq!(wire.host, "127.0.0.1:8082");
        assert_eq!(wire.timestamp, timestamp);
        assert!(timestamp > 0);
    }
}
