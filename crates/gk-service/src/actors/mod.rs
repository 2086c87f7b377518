//! Actor implementations for audit and statistics distribution.
//!
//! ```text
//! ACL layer ──publish──> Broadcaster<AuditEvent> ──> log subscriber streams
//!           ──publish──> Broadcaster<Visit> ──> StatsAggregator (one per subscription)
//!                                                   └── periodic StatsSnapshot
//! ```
//!
//! Every piece of mutable state (subscriber sets, snapshot accumulators) is
//! owned by exactly one task. All interaction goes through channels.

pub mod broadcaster;
pub mod messages;
pub mod stats;

pub use broadcaster::{BroadcasterHandle, Subscription};
pub use messages::{AuditEvent, StatsSnapshot, StreamKind, Visit, HANDOFF_CAPACITY};
pub use stats::{window_from_seconds, StatsAggregator};
