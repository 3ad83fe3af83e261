//! Event sourcing engine for statistical aggregates.
//!
//! Translates typed domain events to and from the store's JSON records,
//! stamps and persists them, and replays an entity's stream onto a blank
//! aggregate to reconstruct current or historical state.

pub mod audit;
pub mod engine;
pub mod metrics;

pub use audit::{AuditEntry, Durability, SaveEventsError};
pub use engine::EventSourcingEngine;
pub use metrics::{ReplayMetrics, ReplayMetricsSnapshot};
