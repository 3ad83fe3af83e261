//! PostgreSQL-backed shared tier.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::shared::SharedCacheBackend;

/// Shared tier stored in the `cache_entries` table.
#[derive(Debug, Clone)]
pub struct PgSharedCache {
    pool: PgPool,
}

impl PgSharedCache {
    /// Creates a backend using the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CacheRow {
    region: String,
    cache_key: String,
    value: Vec<u8>,
    created_at: DateTime<Utc>,
    ttl_seconds: i64,
}

impl From<CacheRow> for CacheEntry {
    fn from(row: CacheRow) -> Self {
        Self {
            key: row.cache_key,
            value: row.value,
            region: row.region,
            created_at: row.created_at,
            ttl_seconds: u64::try_from(row.ttl_seconds).unwrap_or(0),
        }
    }
}

#[async_trait]
impl SharedCacheBackend for PgSharedCache {
    async fn get(&self, region: &str, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let row: Option<CacheRow> = sqlx::query_as(
            "SELECT region, cache_key, value, created_at, ttl_seconds \
             FROM cache_entries WHERE region = $1 AND cache_key = $2",
        )
        .bind(region)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CacheEntry::from))
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let ttl_seconds = i64::try_from(entry.ttl_seconds).unwrap_or(i64::MAX);
        let expires_at = entry.expires_at();

        sqlx::query(
            "INSERT INTO cache_entries (region, cache_key, value, created_at, ttl_seconds, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (region, cache_key) DO UPDATE SET \
               value = EXCLUDED.value, \
               created_at = EXCLUDED.created_at, \
               ttl_seconds = EXCLUDED.ttl_seconds, \
               expires_at = EXCLUDED.expires_at",
        )
        .bind(&entry.region)
        .bind(&entry.key)
        .bind(&entry.value)
        .bind(entry.created_at)
        .bind(ttl_seconds)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, region: &str, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entries WHERE region = $1 AND cache_key = $2")
            .bind(region)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn entry_count(&self) -> Result<u64, CacheError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
