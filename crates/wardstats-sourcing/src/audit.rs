//! Audit trail entries and batch durability reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use wardstats_core::error::DomainError;

/// One persisted event, as recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    /// Entity the event was appended to.
    pub entity_id: String,
    /// Aggregate type of the entity.
    pub entity_type: String,
    /// Event type tag.
    pub event_type: String,
    /// Store-assigned sequence number.
    pub sequence_number: i64,
    /// Who caused the event, if known.
    pub actor_id: Option<String>,
    /// Timestamp stamped on the event.
    pub occurred_at: DateTime<Utc>,
}

/// How much of a batch made it to durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Every event in the batch was persisted.
    Durable,
    /// A prefix of the batch was persisted before the failure.
    PartiallyDurable,
    /// Nothing was persisted.
    NotDurable,
}

/// A batch save stopped at the first event that could not be persisted.
///
/// Events are appended in order, so `persisted` is always a prefix of the
/// batch.
#[derive(Debug, Error)]
#[error("persisted {} of {attempted} events for {entity_id}: {source}", .persisted.len())]
pub struct SaveEventsError {
    /// Entity the batch was written to.
    pub entity_id: String,
    /// Events that were persisted before the failure.
    pub persisted: Vec<AuditEntry>,
    /// Number of events in the batch.
    pub attempted: usize,
    /// Why the next event failed.
    #[source]
    pub source: DomainError,
}

impl SaveEventsError {
    /// Returns whether the write is partially durable or not durable at all.
    #[must_use]
    pub fn durability(&self) -> Durability {
        if self.persisted.is_empty() {
            Durability::NotDurable
        } else {
            Durability::PartiallyDurable
        }
    }
}
