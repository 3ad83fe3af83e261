//! Event record store abstraction.
//!
//! The store is a generic `(entity id, sequence number, JSON payload)` ledger.
//! It knows nothing about event meaning; decoding lives in the sourcing engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// Stored representation of a domain event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Entity this event belongs to.
    pub entity_id: String,
    /// Aggregate type name of the entity.
    pub entity_type: String,
    /// Event type tag for decoder lookup.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Sequence number within the entity stream.
    pub sequence_number: i64,
    /// When the fact occurred.
    pub occurred_at: DateTime<Utc>,
    /// Who caused the event, if known.
    pub actor_id: Option<String>,
}

/// An event waiting to be appended. The store assigns the sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendRecord {
    /// When set, the append only succeeds if this is still the stream's last
    /// sequence number; otherwise it fails with `ConcurrencyConflict`.
    pub expected_sequence: Option<i64>,
    /// Entity this event belongs to.
    pub entity_id: String,
    /// Aggregate type name of the entity.
    pub entity_type: String,
    /// Event type tag.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Who caused the event, if known.
    pub actor_id: Option<String>,
    /// When the fact occurred.
    pub occurred_at: DateTime<Utc>,
}

impl AppendRecord {
    /// Turns the pending record into a stored one with the given sequence
    /// number and a fresh event id.
    #[must_use]
    pub fn into_record(self, sequence_number: i64) -> EventRecord {
        EventRecord {
            event_id: Uuid::now_v7(),
            entity_id: self.entity_id,
            entity_type: self.entity_type,
            event_type: self.event_type,
            payload: self.payload,
            sequence_number,
            occurred_at: self.occurred_at,
            actor_id: self.actor_id,
        }
    }
}

/// Durable, append-only storage of domain events keyed by
/// `(entity id, sequence number)`.
#[async_trait]
pub trait EventRecordStore: Send + Sync {
    /// Appends one event, assigning `last_sequence(entity_id) + 1` atomically.
    /// Concurrent appends for the same entity are serialized, and the
    /// `expected_sequence` check runs inside that serialized step.
    ///
    /// Returns the assigned sequence number.
    async fn append(&self, record: AppendRecord) -> Result<i64, DomainError>;

    /// Loads events with `sequence_number >= from_sequence` (and
    /// `<= to_sequence` when given), ascending.
    async fn read_from(
        &self,
        entity_id: &str,
        from_sequence: i64,
        to_sequence: Option<i64>,
    ) -> Result<Vec<EventRecord>, DomainError>;

    /// Loads events with `occurred_at < cutoff`, ascending by sequence number.
    async fn read_as_of(
        &self,
        entity_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, DomainError>;

    /// Returns the highest sequence number for the entity, or 0 if it has no
    /// events.
    async fn last_sequence(&self, entity_id: &str) -> Result<i64, DomainError>;

    /// Returns the distinct entity ids recorded under an aggregate type,
    /// sorted ascending.
    async fn entity_ids(&self, entity_type: &str) -> Result<Vec<String>, DomainError>;
}
