//! Domain event abstractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::EventRecord;

/// Metadata the store attaches to every persisted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Entity (aggregate instance) this event belongs to.
    pub entity_id: String,
    /// Aggregate type name of the entity.
    pub entity_type: String,
    /// Type tag used to select a decoder.
    pub event_type: String,
    /// Position in the entity's stream, starting at 1.
    pub sequence_number: i64,
    /// When the fact occurred.
    pub occurred_at: DateTime<Utc>,
    /// Who caused the event, if known.
    pub actor_id: Option<String>,
}

impl From<&EventRecord> for EventMetadata {
    fn from(record: &EventRecord) -> Self {
        Self {
            event_id: record.event_id,
            entity_id: record.entity_id.clone(),
            entity_type: record.entity_type.clone(),
            event_type: record.event_type.clone(),
            sequence_number: record.sequence_number,
            occurred_at: record.occurred_at,
            actor_id: record.actor_id.clone(),
        }
    }
}

/// Trait that all typed domain events implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type tag (used for decoder lookup on replay).
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if the payload cannot be
    /// represented as JSON.
    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error>;
}

/// A decoded event together with the metadata it was stored with.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded<E> {
    /// Store-assigned metadata.
    pub metadata: EventMetadata,
    /// The typed event.
    pub event: E,
}

impl<E> Recorded<E> {
    /// Returns the sequence number of the event within its entity stream.
    #[must_use]
    pub fn sequence_number(&self) -> i64 {
        self.metadata.sequence_number
    }

    /// Returns the time the event occurred.
    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.metadata.occurred_at
    }
}
