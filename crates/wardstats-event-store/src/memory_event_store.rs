//! In-memory implementation of the `EventRecordStore` trait.
//!
//! Used for local development and tests. Each entity stream sits behind its
//! own async mutex, held only for the duration of one append, which makes the
//! read-last-then-insert step atomic per entity while leaving other entities
//! unblocked.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use wardstats_core::error::DomainError;
use wardstats_core::repository::{AppendRecord, EventRecord, EventRecordStore};

#[derive(Debug)]
struct Stream {
    entity_type: String,
    events: tokio::sync::Mutex<Vec<EventRecord>>,
}

/// Event record store that keeps every stream in process memory.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: Mutex<HashMap<String, Arc<Stream>>>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn stream_for_append(&self, record: &AppendRecord) -> Arc<Stream> {
        let mut streams = self.streams.lock();
        Arc::clone(streams.entry(record.entity_id.clone()).or_insert_with(|| {
            Arc::new(Stream {
                entity_type: record.entity_type.clone(),
                events: tokio::sync::Mutex::new(Vec::new()),
            })
        }))
    }

    fn existing_stream(&self, entity_id: &str) -> Option<Arc<Stream>> {
        self.streams.lock().get(entity_id).cloned()
    }

    async fn filtered(
        &self,
        entity_id: &str,
        keep: impl Fn(&EventRecord) -> bool,
    ) -> Vec<EventRecord> {
        let Some(stream) = self.existing_stream(entity_id) else {
            return Vec::new();
        };
        let events = stream.events.lock().await;
        events.iter().filter(|e| keep(e)).cloned().collect()
    }
}

#[async_trait]
impl EventRecordStore for InMemoryEventStore {
    async fn append(&self, record: AppendRecord) -> Result<i64, DomainError> {
        let stream = self.stream_for_append(&record);
        let mut events = stream.events.lock().await;
        let last = events.last().map_or(0, |e| e.sequence_number);
        if let Some(expected) = record.expected_sequence {
            if expected != last {
                return Err(DomainError::ConcurrencyConflict {
                    entity_id: record.entity_id,
                    sequence_number: expected + 1,
                });
            }
        }
        let next = last + 1;
        events.push(record.into_record(next));
        Ok(next)
    }

    async fn read_from(
        &self,
        entity_id: &str,
        from_sequence: i64,
        to_sequence: Option<i64>,
    ) -> Result<Vec<EventRecord>, DomainError> {
        Ok(self
            .filtered(entity_id, |e| {
                e.sequence_number >= from_sequence
                    && to_sequence.is_none_or(|to| e.sequence_number <= to)
            })
            .await)
    }

    async fn read_as_of(
        &self,
        entity_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, DomainError> {
        Ok(self.filtered(entity_id, |e| e.occurred_at < cutoff).await)
    }

    async fn last_sequence(&self, entity_id: &str) -> Result<i64, DomainError> {
        let Some(stream) = self.existing_stream(entity_id) else {
            return Ok(0);
        };
        let events = stream.events.lock().await;
        Ok(events.last().map_or(0, |e| e.sequence_number))
    }

    async fn entity_ids(&self, entity_type: &str) -> Result<Vec<String>, DomainError> {
        let mut ids: Vec<String> = self
            .streams
            .lock()
            .iter()
            .filter(|(_, stream)| stream.entity_type == entity_type)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
