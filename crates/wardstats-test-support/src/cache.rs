//! Test shared tiers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use wardstats_cache::entry::CacheEntry;
use wardstats_cache::error::CacheError;
use wardstats_cache::shared::{InMemorySharedCache, SharedCacheBackend};

/// A shared tier that is never reachable.
#[derive(Debug, Default)]
pub struct UnavailableSharedCache;

fn down() -> CacheError {
    CacheError::Unavailable("connection refused".into())
}

#[async_trait]
impl SharedCacheBackend for UnavailableSharedCache {
    async fn get(&self, _region: &str, _key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Err(down())
    }

    async fn put(&self, _entry: CacheEntry) -> Result<(), CacheError> {
        Err(down())
    }

    async fn remove(&self, _region: &str, _key: &str) -> Result<(), CacheError> {
        Err(down())
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64, CacheError> {
        Err(down())
    }

    async fn entry_count(&self) -> Result<u64, CacheError> {
        Err(down())
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// A working shared tier that answers every call only after `delay`, like a
/// backend behind a network partition.
#[derive(Debug)]
pub struct SlowSharedCache {
    inner: InMemorySharedCache,
    delay: Duration,
}

impl SlowSharedCache {
    /// Creates a tier that stalls each call for `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemorySharedCache::new(),
            delay,
        }
    }
}

#[async_trait]
impl SharedCacheBackend for SlowSharedCache {
    async fn get(&self, region: &str, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(region, key).await
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        tokio::time::sleep(self.delay).await;
        self.inner.put(entry).await
    }

    async fn remove(&self, region: &str, key: &str) -> Result<(), CacheError> {
        tokio::time::sleep(self.delay).await;
        self.inner.remove(region, key).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError> {
        tokio::time::sleep(self.delay).await;
        self.inner.purge_expired(now).await
    }

    async fn entry_count(&self) -> Result<u64, CacheError> {
        tokio::time::sleep(self.delay).await;
        self.inner.entry_count().await
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}
