//! Test event stores: `EventRecordStore` implementations that fail on cue.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use wardstats_core::error::DomainError;
use wardstats_core::repository::{AppendRecord, EventRecord, EventRecordStore};
use wardstats_event_store::memory_event_store::InMemoryEventStore;

fn refused() -> DomainError {
    DomainError::Storage("connection refused".into())
}

/// An event store whose every operation fails with a storage error. Useful
/// for testing durability-failure paths.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventRecordStore for FailingEventStore {
    async fn append(&self, _record: AppendRecord) -> Result<i64, DomainError> {
        Err(refused())
    }

    async fn read_from(
        &self,
        _entity_id: &str,
        _from_sequence: i64,
        _to_sequence: Option<i64>,
    ) -> Result<Vec<EventRecord>, DomainError> {
        Err(refused())
    }

    async fn read_as_of(
        &self,
        _entity_id: &str,
        _cutoff: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, DomainError> {
        Err(refused())
    }

    async fn last_sequence(&self, _entity_id: &str) -> Result<i64, DomainError> {
        Err(refused())
    }

    async fn entity_ids(&self, _entity_type: &str) -> Result<Vec<String>, DomainError> {
        Err(refused())
    }
}

/// An in-memory event store that accepts a fixed number of appends and then
/// fails every further append. Reads keep working, so partially persisted
/// batches can be inspected.
#[derive(Debug)]
pub struct FlakyEventStore {
    inner: InMemoryEventStore,
    remaining: AtomicUsize,
}

impl FlakyEventStore {
    /// Creates a store that lets `appends` appends through.
    #[must_use]
    pub fn failing_after(appends: usize) -> Self {
        Self {
            inner: InMemoryEventStore::new(),
            remaining: AtomicUsize::new(appends),
        }
    }
}

#[async_trait]
impl EventRecordStore for FlakyEventStore {
    async fn append(&self, record: AppendRecord) -> Result<i64, DomainError> {
        let allowed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(refused());
        }
        self.inner.append(record).await
    }

    async fn read_from(
        &self,
        entity_id: &str,
        from_sequence: i64,
        to_sequence: Option<i64>,
    ) -> Result<Vec<EventRecord>, DomainError> {
        self.inner.read_from(entity_id, from_sequence, to_sequence).await
    }

    async fn read_as_of(
        &self,
        entity_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, DomainError> {
        self.inner.read_as_of(entity_id, cutoff).await
    }

    async fn last_sequence(&self, entity_id: &str) -> Result<i64, DomainError> {
        self.inner.last_sequence(entity_id).await
    }

    async fn entity_ids(&self, entity_type: &str) -> Result<Vec<String>, DomainError> {
        self.inner.entity_ids(entity_type).await
    }
}

/// An in-memory event store that yields to the scheduler after every stream
/// read, so concurrent load-then-append sequences interleave.
#[derive(Debug, Default)]
pub struct YieldingEventStore {
    inner: InMemoryEventStore,
}

impl YieldingEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRecordStore for YieldingEventStore {
    async fn append(&self, record: AppendRecord) -> Result<i64, DomainError> {
        self.inner.append(record).await
    }

    async fn read_from(
        &self,
        entity_id: &str,
        from_sequence: i64,
        to_sequence: Option<i64>,
    ) -> Result<Vec<EventRecord>, DomainError> {
        let records = self.inner.read_from(entity_id, from_sequence, to_sequence).await;
        tokio::task::yield_now().await;
        records
    }

    async fn read_as_of(
        &self,
        entity_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, DomainError> {
        self.inner.read_as_of(entity_id, cutoff).await
    }

    async fn last_sequence(&self, entity_id: &str) -> Result<i64, DomainError> {
        self.inner.last_sequence(entity_id).await
    }

    async fn entity_ids(&self, entity_type: &str) -> Result<Vec<String>, DomainError> {
        self.inner.entity_ids(entity_type).await
    }
}
