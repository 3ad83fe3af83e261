//! Shared-tier abstraction and an in-memory backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::entry::CacheEntry;
use crate::error::CacheError;

/// A cache tier reachable from every process, holding serialized entries.
///
/// Backends store whatever they are given; the caller decides expiry by
/// checking [`CacheEntry::is_expired_at`] on reads.
#[async_trait]
pub trait SharedCacheBackend: Send + Sync {
    /// Returns the stored entry for `(region, key)`, expired or not.
    async fn get(&self, region: &str, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Inserts or replaces an entry.
    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Removes an entry if present.
    async fn remove(&self, region: &str, key: &str) -> Result<(), CacheError>;

    /// Deletes every entry expired at `now`. Returns how many were deleted.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError>;

    /// Returns the number of stored entries.
    async fn entry_count(&self) -> Result<u64, CacheError>;

    /// Whether the backend expires entries itself, making sweeps redundant.
    fn has_native_expiry(&self) -> bool {
        false
    }

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Shared tier kept in process memory. Used for single-node deployments and
/// tests.
#[derive(Debug, Default)]
pub struct InMemorySharedCache {
    entries: Mutex<HashMap<(String, String), CacheEntry>>,
}

impl InMemorySharedCache {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedCacheBackend for InMemorySharedCache {
    async fn get(&self, region: &str, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self
            .entries
            .lock()
            .get(&(region.to_owned(), key.to_owned()))
            .cloned())
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries
            .lock()
            .insert((entry.region.clone(), entry.key.clone()), entry);
        Ok(())
    }

    async fn remove(&self, region: &str, key: &str) -> Result<(), CacheError> {
        self.entries
            .lock()
            .remove(&(region.to_owned(), key.to_owned()));
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError> {
        let mut guard = self.entries.lock();
        let before = guard.len();
        guard.retain(|_, entry| !entry.is_expired_at(now));
        Ok((before - guard.len()) as u64)
    }

    async fn entry_count(&self) -> Result<u64, CacheError> {
        Ok(self.entries.lock().len() as u64)
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;

    fn entry(key: &str, ttl_seconds: u64) -> CacheEntry {
        CacheEntry {
            key: key.to_owned(),
            value: b"1".to_vec(),
            region: "r".to_owned(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            ttl_seconds,
        }
    }

    #[tokio::test]
    async fn test_put_then_get_returns_entry() {
        let cache = InMemorySharedCache::new();
        cache.put(entry("k", 60)).await.unwrap();

        let found = cache.get("r", "k").await.unwrap().unwrap();

        assert_eq!(found.key, "k");
        assert_eq!(found.value, b"1");
        assert!(cache.get("other", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_deletes_only_expired_entries() {
        let cache = InMemorySharedCache::new();
        let short = entry("short", 10);
        let created = short.created_at;
        cache.put(short).await.unwrap();
        cache.put(entry("long", 100)).await.unwrap();

        let purged = cache
            .purge_expired(created + TimeDelta::seconds(10))
            .await
            .unwrap();

        assert_eq!(purged, 1);
        assert_eq!(cache.entry_count().await.unwrap(), 1);
        assert!(cache.get("r", "long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let cache = InMemorySharedCache::new();
        cache.put(entry("k", 60)).await.unwrap();

        cache.remove("r", "k").await.unwrap();
        cache.remove("r", "k").await.unwrap();

        assert_eq!(cache.entry_count().await.unwrap(), 0);
    }
}
