//! Domain error types.

use thiserror::Error;

/// Top-level error type shared by the store, the engine, and the aggregates.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No events exist for the requested entity.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(String),

    /// Two writers raced for the same sequence number and retries ran out.
    #[error("concurrency conflict on entity {entity_id}: sequence number {sequence_number} already taken")]
    ConcurrencyConflict {
        /// The entity whose stream had the conflict.
        entity_id: String,
        /// The sequence number that could not be claimed.
        sequence_number: i64,
    },

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An event payload could not be serialized for storage.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The durable storage could not complete the operation. Nothing from the
    /// failed operation was persisted.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrency_conflict_message_names_entity_and_sequence() {
        let err = DomainError::ConcurrencyConflict {
            entity_id: "ward-7".to_owned(),
            sequence_number: 3,
        };

        assert_eq!(
            err.to_string(),
            "concurrency conflict on entity ward-7: sequence number 3 already taken"
        );
    }

    #[test]
    fn test_serde_error_converts_to_serialization() {
        let err = serde_json::from_str::<u32>("not a number").unwrap_err();

        match DomainError::from(err) {
            DomainError::Serialization(msg) => assert!(!msg.is_empty()),
            other => panic!("expected Serialization, got {other:?}"),
        }
    }
}
