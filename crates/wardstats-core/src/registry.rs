//! Closed registry mapping event type tags to decoders.
//!
//! Each aggregate type builds one registry at startup listing every event
//! tag it understands. A record whose tag is not registered decodes to
//! [`DecodeError::UnknownEventType`] instead of failing a runtime lookup.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::event::{EventMetadata, Recorded};
use crate::repository::EventRecord;

/// Turns a stored JSON payload into a typed event.
pub type Decoder<E> = fn(serde_json::Value) -> Result<E, serde_json::Error>;

/// Why a stored record could not be turned into a typed event.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No decoder is registered for the tag (e.g. a retired event type).
    #[error("unknown event type {event_type} at sequence {sequence_number}")]
    UnknownEventType {
        /// The unregistered tag.
        event_type: String,
        /// Position of the record in its stream.
        sequence_number: i64,
    },

    /// The decoder rejected the payload.
    #[error("malformed {event_type} payload at sequence {sequence_number}: {source}")]
    MalformedPayload {
        /// The tag whose decoder failed.
        event_type: String,
        /// Position of the record in its stream.
        sequence_number: i64,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Returns the event type tag of the record that failed to decode.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::UnknownEventType { event_type, .. } | Self::MalformedPayload { event_type, .. } => {
                event_type
            }
        }
    }
}

/// Registry of decoders for one event family.
pub struct EventRegistry<E> {
    decoders: HashMap<&'static str, Decoder<E>>,
}

impl<E> EventRegistry<E> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers a decoder for `event_type`, replacing any previous one.
    #[must_use]
    pub fn register(mut self, event_type: &'static str, decoder: Decoder<E>) -> Self {
        self.decoders.insert(event_type, decoder);
        self
    }

    /// Returns whether a decoder exists for `event_type`.
    #[must_use]
    pub fn contains(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Returns the registered tags, sorted.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut tags: Vec<&'static str> = self.decoders.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Decodes a stored record into a typed event with its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownEventType`] when the tag is not
    /// registered and [`DecodeError::MalformedPayload`] when the payload does
    /// not match the registered decoder.
    pub fn decode(&self, record: &EventRecord) -> Result<Recorded<E>, DecodeError> {
        let decoder =
            self.decoders
                .get(record.event_type.as_str())
                .ok_or_else(|| DecodeError::UnknownEventType {
                    event_type: record.event_type.clone(),
                    sequence_number: record.sequence_number,
                })?;

        let event = decoder(record.payload.clone()).map_err(|source| {
            DecodeError::MalformedPayload {
                event_type: record.event_type.clone(),
                sequence_number: record.sequence_number,
                source,
            }
        })?;

        Ok(Recorded {
            metadata: EventMetadata::from(record),
            event,
        })
    }
}

impl<E> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}
