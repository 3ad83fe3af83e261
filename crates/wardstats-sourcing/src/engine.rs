//! The event sourcing engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use wardstats_core::aggregate::StatisticalAggregate;
use wardstats_core::clock::Clock;
use wardstats_core::error::DomainError;
use wardstats_core::event::{DomainEvent, Recorded};
use wardstats_core::registry::EventRegistry;
use wardstats_core::repository::{AppendRecord, EventRecord, EventRecordStore};

use crate::audit::{AuditEntry, SaveEventsError};
use crate::metrics::{ReplayMetrics, ReplayMetricsSnapshot};

/// Persists typed events through an [`EventRecordStore`] and replays them.
///
/// The store stays a generic ledger; each aggregate type supplies the
/// [`EventRegistry`] that gives its records meaning.
pub struct EventSourcingEngine {
    store: Arc<dyn EventRecordStore>,
    clock: Arc<dyn Clock>,
    metrics: ReplayMetrics,
}

impl EventSourcingEngine {
    /// Creates an engine over `store`, stamping events with `clock`.
    #[must_use]
    pub fn new(store: Arc<dyn EventRecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            metrics: ReplayMetrics::default(),
        }
    }

    /// Returns the underlying record store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EventRecordStore> {
        &self.store
    }

    /// Returns the clock used for event timestamps.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the replay counters, including events skipped as undecodable.
    #[must_use]
    pub fn replay_metrics(&self) -> ReplayMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Serializes and appends `events` in order, returning one audit entry per
    /// persisted event.
    ///
    /// # Errors
    ///
    /// Stops at the first event that cannot be serialized or persisted and
    /// returns a [`SaveEventsError`] listing the events that did make it, so
    /// the caller can tell a partially durable write from a failed one.
    pub async fn save_events<E: DomainEvent>(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        events: &[E],
        actor_id: Option<&str>,
    ) -> Result<Vec<AuditEntry>, SaveEventsError> {
        self.save(aggregate_id, aggregate_type, events, actor_id, None)
            .await
    }

    /// Like [`EventSourcingEngine::save_events`], but the first event is only
    /// appended if the stream still ends at `expected_sequence`, and each
    /// following event expects its predecessor. A writer that loaded stale
    /// state gets `DomainError::ConcurrencyConflict` and persists nothing.
    ///
    /// # Errors
    ///
    /// Same as [`EventSourcingEngine::save_events`].
    pub async fn save_events_after<E: DomainEvent>(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        events: &[E],
        actor_id: Option<&str>,
        expected_sequence: i64,
    ) -> Result<Vec<AuditEntry>, SaveEventsError> {
        self.save(
            aggregate_id,
            aggregate_type,
            events,
            actor_id,
            Some(expected_sequence),
        )
        .await
    }

    async fn save<E: DomainEvent>(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        events: &[E],
        actor_id: Option<&str>,
        expected_sequence: Option<i64>,
    ) -> Result<Vec<AuditEntry>, SaveEventsError> {
        let mut persisted = Vec::with_capacity(events.len());

        for (offset, event) in (0_i64..).zip(events) {
            let expected = expected_sequence.map(|base| base + offset);
            match self
                .append_one(aggregate_id, aggregate_type, event, actor_id, expected)
                .await
            {
                Ok(entry) => {
                    tracing::info!(
                        entity_id = %entry.entity_id,
                        entity_type = %entry.entity_type,
                        event_type = %entry.event_type,
                        sequence_number = entry.sequence_number,
                        actor_id = entry.actor_id.as_deref().unwrap_or("unknown"),
                        "event persisted"
                    );
                    persisted.push(entry);
                }
                Err(source) => {
                    tracing::error!(
                        entity_id = aggregate_id,
                        event_type = event.event_type(),
                        persisted = persisted.len(),
                        attempted = events.len(),
                        error = %source,
                        "event batch failed to persist"
                    );
                    return Err(SaveEventsError {
                        entity_id: aggregate_id.to_owned(),
                        persisted,
                        attempted: events.len(),
                        source,
                    });
                }
            }
        }

        Ok(persisted)
    }

    async fn append_one<E: DomainEvent>(
        &self,
        aggregate_id: &str,
        aggregate_type: &str,
        event: &E,
        actor_id: Option<&str>,
        expected_sequence: Option<i64>,
    ) -> Result<AuditEntry, DomainError> {
        let payload = event.to_payload()?;
        let occurred_at = self.clock.now();
        let record = AppendRecord {
            expected_sequence,
            entity_id: aggregate_id.to_owned(),
            entity_type: aggregate_type.to_owned(),
            event_type: event.event_type().to_owned(),
            payload,
            actor_id: actor_id.map(str::to_owned),
            occurred_at,
        };
        let sequence_number = self.store.append(record).await?;

        Ok(AuditEntry {
            entity_id: aggregate_id.to_owned(),
            entity_type: aggregate_type.to_owned(),
            event_type: event.event_type().to_owned(),
            sequence_number,
            actor_id: actor_id.map(str::to_owned),
            occurred_at,
        })
    }

    /// Loads and decodes events in a sequence window.
    ///
    /// Records that cannot be decoded are skipped with a warning and counted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Storage` if the store read fails.
    pub async fn get_events<E>(
        &self,
        registry: &EventRegistry<E>,
        entity_id: &str,
        from_sequence: i64,
        to_sequence: Option<i64>,
    ) -> Result<Vec<Recorded<E>>, DomainError> {
        let records = self
            .store
            .read_from(entity_id, from_sequence, to_sequence)
            .await?;
        Ok(self.decode_all(registry, &records))
    }

    /// Loads and decodes every event that occurred strictly before `cutoff`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Storage` if the store read fails.
    pub async fn get_events_as_of<E>(
        &self,
        registry: &EventRegistry<E>,
        entity_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Recorded<E>>, DomainError> {
        let records = self.store.read_as_of(entity_id, cutoff).await?;
        Ok(self.decode_all(registry, &records))
    }

    /// Reconstructs `blank` as it stood at `cutoff`.
    ///
    /// When the entity has no decodable history before `cutoff` the blank
    /// aggregate comes back unchanged, with version 0.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Storage` if the store read fails.
    #[tracing::instrument(skip(self, blank), fields(entity_id = %blank.entity_id()), err)]
    pub async fn rebuild_entity<A: StatisticalAggregate>(
        &self,
        blank: A,
        cutoff: DateTime<Utc>,
    ) -> Result<A, DomainError> {
        let events = self
            .get_events_as_of(A::event_registry(), blank.entity_id(), cutoff)
            .await?;
        Ok(Self::replay(blank, &events))
    }

    /// Reconstructs `blank` from its full stream.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Storage` if the store read fails.
    #[tracing::instrument(skip(self, blank), fields(entity_id = %blank.entity_id()), err)]
    pub async fn load_current<A: StatisticalAggregate>(&self, blank: A) -> Result<A, DomainError> {
        let events = self
            .get_events(A::event_registry(), blank.entity_id(), 1, None)
            .await?;
        Ok(Self::replay(blank, &events))
    }

    /// Reconstructs `blank` from its full stream and returns it with the last
    /// sequence number read, undecodable records included. Pass that number
    /// to [`EventSourcingEngine::save_events_after`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Storage` if the store read fails.
    #[tracing::instrument(skip(self, blank), fields(entity_id = %blank.entity_id()), err)]
    pub async fn load_for_update<A: StatisticalAggregate>(
        &self,
        blank: A,
    ) -> Result<(A, i64), DomainError> {
        let records = self.store.read_from(blank.entity_id(), 1, None).await?;
        let last_sequence = records.last().map_or(0, |r| r.sequence_number);
        let events = self.decode_all(A::event_registry(), &records);
        Ok((Self::replay(blank, &events), last_sequence))
    }

    fn replay<A: StatisticalAggregate>(blank: A, events: &[Recorded<A::Event>]) -> A {
        if events.is_empty() {
            tracing::debug!("no history to replay");
            return blank;
        }
        blank.rebuild_from_events(events)
    }

    fn decode_all<E>(&self, registry: &EventRegistry<E>, records: &[EventRecord]) -> Vec<Recorded<E>> {
        let mut decoded = Vec::with_capacity(records.len());
        for record in records {
            match registry.decode(record) {
                Ok(event) => decoded.push(event),
                Err(err) => {
                    tracing::warn!(
                        entity_id = %record.entity_id,
                        event_type = %record.event_type,
                        sequence_number = record.sequence_number,
                        error = %err,
                        "skipping undecodable event during replay"
                    );
                    self.metrics.record_skipped(err.event_type());
                }
            }
        }
        self.metrics.record_replayed(decoded.len());
        decoded
    }
}

impl std::fmt::Debug for EventSourcingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSourcingEngine")
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use chrono::{Duration, TimeZone};
    use serde::{Deserialize, Serialize};
    use wardstats_event_store::memory_event_store::InMemoryEventStore;
    use wardstats_test_support::{FailingEventStore, FlakyEventStore, ManualClock};

    use super::*;
    use crate::audit::Durability;

    // A minimal aggregate: a running total.

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Opened {
        start: i64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Added {
        by: i64,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum TallyEvent {
        Opened(Opened),
        Added(Added),
    }

    impl DomainEvent for TallyEvent {
        fn event_type(&self) -> &'static str {
            match self {
                Self::Opened(_) => "tally.opened",
                Self::Added(_) => "tally.added",
            }
        }

        fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
            match self {
                Self::Opened(p) => serde_json::to_value(p),
                Self::Added(p) => serde_json::to_value(p),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Tally {
        id: String,
        version: i64,
        total: i64,
        pending: Vec<TallyEvent>,
    }

    impl Tally {
        fn blank(id: &str) -> Self {
            Self {
                id: id.to_owned(),
                version: 0,
                total: 0,
                pending: Vec::new(),
            }
        }
    }

    impl StatisticalAggregate for Tally {
        type Event = TallyEvent;

        fn entity_type() -> &'static str {
            "tally"
        }

        fn event_registry() -> &'static EventRegistry<TallyEvent> {
            static REGISTRY: OnceLock<EventRegistry<TallyEvent>> = OnceLock::new();
            REGISTRY.get_or_init(|| {
                EventRegistry::new()
                    .register("tally.opened", |v| {
                        serde_json::from_value(v).map(TallyEvent::Opened)
                    })
                    .register("tally.added", |v| serde_json::from_value(v).map(TallyEvent::Added))
            })
        }

        fn entity_id(&self) -> &str {
            &self.id
        }

        fn version(&self) -> i64 {
            self.version
        }

        fn evolve(mut self, event: &Recorded<TallyEvent>) -> Self {
            match &event.event {
                TallyEvent::Opened(p) => self.total = p.start,
                TallyEvent::Added(p) => self.total += p.by,
            }
            self.version += 1;
            self
        }

        fn uncommitted_events(&self) -> &[TallyEvent] {
            &self.pending
        }

        fn produce_events(&mut self) -> Vec<TallyEvent> {
            std::mem::take(&mut self.pending)
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn engine_with(store: Arc<dyn EventRecordStore>, clock: &Arc<ManualClock>) -> EventSourcingEngine {
        EventSourcingEngine::new(store, Arc::clone(clock) as Arc<dyn Clock>)
    }

    fn opened(start: i64) -> TallyEvent {
        TallyEvent::Opened(Opened { start })
    }

    fn added(by: i64) -> TallyEvent {
        TallyEvent::Added(Added { by })
    }

    #[tokio::test]
    async fn test_save_events_returns_audit_trail_in_order() {
        // Arrange
        let clock = Arc::new(ManualClock::new(start()));
        let engine = engine_with(Arc::new(InMemoryEventStore::new()), &clock);

        // Act
        let trail = engine
            .save_events("t-1", "tally", &[opened(1), added(2)], Some("clerk-9"))
            .await
            .unwrap();

        // Assert
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].sequence_number, 1);
        assert_eq!(trail[0].event_type, "tally.opened");
        assert_eq!(trail[1].sequence_number, 2);
        assert_eq!(trail[1].actor_id.as_deref(), Some("clerk-9"));
        assert_eq!(trail[1].occurred_at, start());
    }

    #[tokio::test]
    async fn test_save_events_after_rejects_writer_with_stale_state() {
        // Arrange
        let clock = Arc::new(ManualClock::new(start()));
        let engine = engine_with(Arc::new(InMemoryEventStore::new()), &clock);
        engine
            .save_events("t-1", "tally", &[opened(10)], None)
            .await
            .unwrap();
        let (_, seen) = engine.load_for_update(Tally::blank("t-1")).await.unwrap();
        engine
            .save_events_after("t-1", "tally", &[added(1)], None, seen)
            .await
            .unwrap();

        // Act
        let err = engine
            .save_events_after("t-1", "tally", &[added(2), added(3)], None, seen)
            .await
            .unwrap_err();

        // Assert
        assert_eq!(err.durability(), Durability::NotDurable);
        assert!(matches!(
            err.source,
            DomainError::ConcurrencyConflict { sequence_number: 2, .. }
        ));
        let tally = engine.load_current(Tally::blank("t-1")).await.unwrap();
        assert_eq!(tally.total, 11);
    }

    #[tokio::test]
    async fn test_save_events_after_chains_expectations_across_a_batch() {
        // Arrange
        let clock = Arc::new(ManualClock::new(start()));
        let engine = engine_with(Arc::new(InMemoryEventStore::new()), &clock);
        let (blank, seen) = engine.load_for_update(Tally::blank("t-1")).await.unwrap();
        assert_eq!(seen, 0);

        // Act
        let trail = engine
            .save_events_after(blank.entity_id(), "tally", &[opened(1), added(2)], None, seen)
            .await
            .unwrap();

        // Assert
        let sequences: Vec<i64> = trail.iter().map(|e| e.sequence_number).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_save_events_reports_partial_durability() {
        // Arrange
        let clock = Arc::new(ManualClock::new(start()));
        let engine = engine_with(Arc::new(FlakyEventStore::failing_after(1)), &clock);

        // Act
        let err = engine
            .save_events("t-1", "tally", &[opened(1), added(2), added(3)], None)
            .await
            .unwrap_err();

        // Assert
        assert_eq!(err.durability(), Durability::PartiallyDurable);
        assert_eq!(err.persisted.len(), 1);
        assert_eq!(err.persisted[0].sequence_number, 1);
        assert_eq!(err.attempted, 3);
        assert!(matches!(err.source, DomainError::Storage(_)));
    }

    #[tokio::test]
    async fn test_save_events_reports_not_durable_when_store_is_down() {
        let clock = Arc::new(ManualClock::new(start()));
        let engine = engine_with(Arc::new(FailingEventStore), &clock);

        let err = engine
            .save_events("t-1", "tally", &[opened(1)], None)
            .await
            .unwrap_err();

        assert_eq!(err.durability(), Durability::NotDurable);
        assert!(err.persisted.is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_entity_between_and_after_events() {
        // Arrange
        let clock = Arc::new(ManualClock::new(start()));
        let engine = engine_with(Arc::new(InMemoryEventStore::new()), &clock);
        engine
            .save_events("t-1", "tally", &[opened(100)], None)
            .await
            .unwrap();
        clock.advance(Duration::hours(1));
        engine
            .save_events("t-1", "tally", &[added(5)], None)
            .await
            .unwrap();

        // Act
        let between = engine
            .rebuild_entity(Tally::blank("t-1"), start() + Duration::minutes(30))
            .await
            .unwrap();
        let after = engine
            .rebuild_entity(Tally::blank("t-1"), start() + Duration::hours(2))
            .await
            .unwrap();

        // Assert
        assert_eq!(between.total, 100);
        assert_eq!(between.version, 1);
        assert_eq!(after.total, 105);
        assert_eq!(after.version, 2);
    }

    #[tokio::test]
    async fn test_rebuild_entity_without_history_returns_blank() {
        let clock = Arc::new(ManualClock::new(start()));
        let engine = engine_with(Arc::new(InMemoryEventStore::new()), &clock);

        let rebuilt = engine
            .rebuild_entity(Tally::blank("t-404"), start())
            .await
            .unwrap();

        assert_eq!(rebuilt, Tally::blank("t-404"));
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_events_are_skipped_and_counted() {
        // Arrange
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(InMemoryEventStore::new());
        let engine = engine_with(Arc::clone(&store) as Arc<dyn EventRecordStore>, &clock);
        engine
            .save_events("t-1", "tally", &[opened(10)], None)
            .await
            .unwrap();
        for (event_type, payload) in [
            ("tally.retired", serde_json::json!({"gone": true})),
            ("tally.added", serde_json::json!({"by": "not a number"})),
        ] {
            store
                .append(AppendRecord {
                    expected_sequence: None,
                    entity_id: "t-1".to_owned(),
                    entity_type: "tally".to_owned(),
                    event_type: event_type.to_owned(),
                    payload,
                    actor_id: None,
                    occurred_at: start(),
                })
                .await
                .unwrap();
        }
        engine
            .save_events("t-1", "tally", &[added(1)], None)
            .await
            .unwrap();

        // Act
        let events = engine
            .get_events(Tally::event_registry(), "t-1", 1, None)
            .await
            .unwrap();
        let current = engine.load_current(Tally::blank("t-1")).await.unwrap();

        // Assert
        assert_eq!(
            events.iter().map(Recorded::sequence_number).collect::<Vec<_>>(),
            vec![1, 4]
        );
        assert_eq!(current.total, 11);
        let metrics = engine.replay_metrics();
        assert_eq!(metrics.skipped, 4);
        assert_eq!(metrics.skipped_by_type.get("tally.retired"), Some(&2));
        assert_eq!(metrics.skipped_by_type.get("tally.added"), Some(&2));
    }

    #[tokio::test]
    async fn test_one_at_a_time_and_batch_appends_replay_identically() {
        let clock = Arc::new(ManualClock::new(start()));
        let engine = engine_with(Arc::new(InMemoryEventStore::new()), &clock);
        let events = [opened(7), added(3), added(-2)];

        engine
            .save_events("batch", "tally", &events, None)
            .await
            .unwrap();
        for event in &events {
            engine
                .save_events("single", "tally", std::slice::from_ref(event), None)
                .await
                .unwrap();
        }

        let batch = engine.load_current(Tally::blank("batch")).await.unwrap();
        let single = engine.load_current(Tally::blank("single")).await.unwrap();
        assert_eq!(batch.total, single.total);
        assert_eq!(batch.version, single.version);
        assert_eq!(batch.total, 8);
    }

    #[tokio::test]
    async fn test_get_events_window() {
        let clock = Arc::new(ManualClock::new(start()));
        let engine = engine_with(Arc::new(InMemoryEventStore::new()), &clock);
        engine
            .save_events("t-1", "tally", &[opened(0), added(1), added(2), added(3)], None)
            .await
            .unwrap();

        let window = engine
            .get_events(Tally::event_registry(), "t-1", 2, Some(3))
            .await
            .unwrap();

        assert_eq!(window.len(), 2);
        assert_eq!(window[0].event, added(1));
        assert_eq!(window[1].event, added(2));
    }
}
