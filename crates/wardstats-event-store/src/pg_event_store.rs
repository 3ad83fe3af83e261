//! `PostgreSQL` implementation of the `EventRecordStore` trait.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use wardstats_core::error::DomainError;
use wardstats_core::repository::{AppendRecord, EventRecord, EventRecordStore};

/// How many times an append is attempted when its sequence number collides.
pub const DEFAULT_MAX_APPEND_ATTEMPTS: u32 = 5;

const BACKOFF_BASE_MS: u64 = 10;

const SELECT_COLUMNS: &str = "event_id, entity_id, entity_type, event_type, payload, \
     sequence_number, occurred_at, actor_id";

/// PostgreSQL-backed event record store.
///
/// Each append runs in its own transaction holding a transaction-scoped
/// advisory lock on the entity, so the `MAX(sequence_number) + 1` read and the
/// insert are one serialized step per entity. The `(entity_id,
/// sequence_number)` unique constraint backs this up for writers that bypass
/// the lock; a collision is retried with jittered backoff.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
    max_append_attempts: u32,
}

impl PgEventStore {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            max_append_attempts: DEFAULT_MAX_APPEND_ATTEMPTS,
        }
    }

    /// Overrides the number of append attempts on sequence collisions.
    #[must_use]
    pub fn with_max_append_attempts(mut self, attempts: u32) -> Self {
        self.max_append_attempts = attempts.max(1);
        self
    }

    async fn try_append(&self, record: &AppendRecord) -> Result<i64, AppendAttemptError> {
        let mut transaction = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::BIGINT)")
            .bind(&record.entity_id)
            .execute(&mut *transaction)
            .await?;

        let last: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence_number), 0) FROM domain_events WHERE entity_id = $1",
        )
        .bind(&record.entity_id)
        .fetch_one(&mut *transaction)
        .await?;
        if let Some(expected) = record.expected_sequence {
            if expected != last {
                return Err(AppendAttemptError::Stale(expected + 1));
            }
        }
        let next = last + 1;

        sqlx::query(
            "INSERT INTO domain_events \
             (event_id, entity_id, entity_type, event_type, payload, sequence_number, occurred_at, actor_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::now_v7())
        .bind(&record.entity_id)
        .bind(&record.entity_type)
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(next)
        .bind(record.occurred_at)
        .bind(record.actor_id.as_deref())
        .execute(&mut *transaction)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppendAttemptError::Conflict(next)
            } else {
                AppendAttemptError::Sqlx(err)
            }
        })?;

        transaction.commit().await?;
        Ok(next)
    }
}

enum AppendAttemptError {
    Conflict(i64),
    Stale(i64),
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for AppendAttemptError {
    fn from(err: sqlx::Error) -> Self {
        Self::Sqlx(err)
    }
}

#[derive(Debug, FromRow)]
struct EventRow {
    event_id: Uuid,
    entity_id: String,
    entity_type: String,
    event_type: String,
    payload: serde_json::Value,
    sequence_number: i64,
    occurred_at: DateTime<Utc>,
    actor_id: Option<String>,
}

impl From<EventRow> for EventRecord {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            entity_id: row.entity_id,
            entity_type: row.entity_type,
            event_type: row.event_type,
            payload: row.payload,
            sequence_number: row.sequence_number,
            occurred_at: row.occurred_at,
            actor_id: row.actor_id,
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn storage_error(err: &sqlx::Error) -> DomainError {
    DomainError::Storage(err.to_string())
}

fn backoff(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_MS.saturating_mul(1 << attempt.min(6));
    let jitter = rand::rng().random_range(0..=base);
    Duration::from_millis(base + jitter)
}

#[async_trait]
impl EventRecordStore for PgEventStore {
    #[tracing::instrument(
        skip(self, record),
        fields(entity_id = %record.entity_id, event_type = %record.event_type),
        err
    )]
    async fn append(&self, record: AppendRecord) -> Result<i64, DomainError> {
        let mut attempt = 1;
        loop {
            match self.try_append(&record).await {
                Ok(sequence_number) => return Ok(sequence_number),
                Err(AppendAttemptError::Conflict(sequence_number))
                    if attempt < self.max_append_attempts =>
                {
                    tracing::warn!(
                        sequence_number,
                        attempt,
                        "sequence number collision, retrying append"
                    );
                    tokio::time::sleep(backoff(attempt)).await;
                    attempt += 1;
                }
                Err(
                    AppendAttemptError::Conflict(sequence_number)
                    | AppendAttemptError::Stale(sequence_number),
                ) => {
                    return Err(DomainError::ConcurrencyConflict {
                        entity_id: record.entity_id.clone(),
                        sequence_number,
                    });
                }
                Err(AppendAttemptError::Sqlx(err)) => return Err(storage_error(&err)),
            }
        }
    }

    async fn read_from(
        &self,
        entity_id: &str,
        from_sequence: i64,
        to_sequence: Option<i64>,
    ) -> Result<Vec<EventRecord>, DomainError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM domain_events \
             WHERE entity_id = $1 AND sequence_number >= $2 \
             AND ($3::BIGINT IS NULL OR sequence_number <= $3) \
             ORDER BY sequence_number ASC"
        );
        let rows: Vec<EventRow> = sqlx::query_as(&sql)
            .bind(entity_id)
            .bind(from_sequence)
            .bind(to_sequence)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| storage_error(&err))?;

        Ok(rows.into_iter().map(EventRecord::from).collect())
    }

    async fn read_as_of(
        &self,
        entity_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<EventRecord>, DomainError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM domain_events \
             WHERE entity_id = $1 AND occurred_at < $2 \
             ORDER BY sequence_number ASC"
        );
        let rows: Vec<EventRow> = sqlx::query_as(&sql)
            .bind(entity_id)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| storage_error(&err))?;

        Ok(rows.into_iter().map(EventRecord::from).collect())
    }

    async fn last_sequence(&self, entity_id: &str) -> Result<i64, DomainError> {
        sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence_number), 0) FROM domain_events WHERE entity_id = $1",
        )
        .bind(entity_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| storage_error(&err))
    }

    async fn entity_ids(&self, entity_type: &str) -> Result<Vec<String>, DomainError> {
        sqlx::query_scalar(
            "SELECT DISTINCT entity_id FROM domain_events WHERE entity_type = $1 ORDER BY entity_id",
        )
        .bind(entity_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| storage_error(&err))
    }
}
