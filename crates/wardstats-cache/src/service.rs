//! The two-tier cache facade.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use wardstats_core::clock::Clock;

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::local::{DEFAULT_LOCAL_CAPACITY, LocalTier};
use crate::region::CacheRegions;
use crate::shared::SharedCacheBackend;
use crate::stats::{Tier, TierCounters, TierStatistics};

/// Number of entries removed by one cleanup sweep, per tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Entries removed from the local tier.
    pub local: u64,
    /// Entries removed from the shared tier.
    pub shared: u64,
}

impl CleanupReport {
    /// Total entries removed.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.local + self.shared
    }
}

/// How long one shared-tier operation may take before it counts as failed.
pub const DEFAULT_SHARED_TIMEOUT: Duration = Duration::from_millis(500);

/// Region-aware cache over a local tier and an optional shared tier.
///
/// Reads try the local tier, then the shared tier. A shared hit repopulates
/// the local tier with the entry's original `created_at` and TTL, so both
/// tiers expire it at the same instant. Shared-tier failures, including
/// operations that outlast the shared timeout, are logged and counted;
/// callers only ever observe a miss.
pub struct CacheService {
    regions: CacheRegions,
    local: LocalTier,
    shared: Option<Arc<dyn SharedCacheBackend>>,
    shared_timeout: Duration,
    clock: Arc<dyn Clock>,
    local_counters: TierCounters,
    shared_counters: TierCounters,
}

impl CacheService {
    /// Creates a local-only cache.
    #[must_use]
    pub fn new(regions: CacheRegions, clock: Arc<dyn Clock>) -> Self {
        Self {
            regions,
            local: LocalTier::new(DEFAULT_LOCAL_CAPACITY),
            shared: None,
            shared_timeout: DEFAULT_SHARED_TIMEOUT,
            clock,
            local_counters: TierCounters::default(),
            shared_counters: TierCounters::default(),
        }
    }

    /// Attaches a shared tier.
    #[must_use]
    pub fn with_shared_tier(mut self, backend: Arc<dyn SharedCacheBackend>) -> Self {
        self.shared = Some(backend);
        self
    }

    /// Sets how long one shared-tier operation may take.
    #[must_use]
    pub fn with_shared_timeout(mut self, timeout: Duration) -> Self {
        self.shared_timeout = timeout;
        self
    }

    /// Bounds the local tier to `capacity` entries.
    #[must_use]
    pub fn with_local_capacity(mut self, capacity: usize) -> Self {
        self.local = LocalTier::new(capacity);
        self
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.shared_timeout, operation)
            .await
            .unwrap_or_else(|_| {
                Err(CacheError::Unavailable(format!(
                    "no response within {:?}",
                    self.shared_timeout
                )))
            })
    }

    /// Returns the region table.
    #[must_use]
    pub fn regions(&self) -> &CacheRegions {
        &self.regions
    }

    /// Looks `key` up in `region`. Never computes anything on a miss.
    pub async fn get<T>(&self, key: &str, region: &str) -> Option<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let policy = self.regions.policy(region);
        let now = self.clock.now();

        if policy.local {
            match self.local.get(region, key, now) {
                Some(value) => match value.downcast::<T>() {
                    Ok(value) => {
                        self.local_counters.hit();
                        return Some(T::clone(&value));
                    }
                    Err(_) => {
                        debug!(region, key, "local entry holds a different type");
                        self.local_counters.miss();
                    }
                },
                None => self.local_counters.miss(),
            }
        }

        if !policy.shared {
            return None;
        }
        let backend = self.shared.as_ref()?;

        let entry = match self.bounded(backend.get(region, key)).await {
            Ok(Some(entry)) if !entry.is_expired_at(now) => entry,
            Ok(_) => {
                self.shared_counters.miss();
                return None;
            }
            Err(err) => {
                self.shared_counters.error();
                warn!(backend = backend.name(), region, key, error = %err, "shared cache read failed");
                return None;
            }
        };

        match policy.format.decode::<T>(&entry.value) {
            Ok(value) => {
                self.shared_counters.hit();
                if policy.local {
                    let evicted = self.local.insert(
                        region,
                        key,
                        Arc::new(value.clone()),
                        entry.created_at,
                        entry.ttl_seconds,
                        now,
                    );
                    self.local_counters.evicted(evicted as u64);
                }
                Some(value)
            }
            Err(err) => {
                self.shared_counters.error();
                warn!(region, key, error = %err, "discarding undecodable shared cache entry");
                None
            }
        }
    }

    /// Stores `value` under `key` in the tiers `region` designates. A `ttl`
    /// of `None` uses the region default.
    pub async fn put<T>(&self, key: &str, value: &T, ttl: Option<Duration>, region: &str)
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let policy = self.regions.policy(region);
        let ttl_seconds = ttl.map_or(policy.ttl_seconds, whole_seconds_up);
        if ttl_seconds == 0 {
            debug!(region, key, "ignoring put with zero ttl");
            return;
        }
        let now = self.clock.now();

        if policy.local {
            let evicted = self.local.insert(
                region,
                key,
                Arc::new(value.clone()),
                now,
                ttl_seconds,
                now,
            );
            self.local_counters.evicted(evicted as u64);
        }

        if !policy.shared {
            return;
        }
        let Some(backend) = self.shared.as_ref() else {
            return;
        };

        let bytes = match policy.format.encode(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.shared_counters.error();
                warn!(region, key, error = %err, "skipping shared cache write");
                return;
            }
        };

        let entry = CacheEntry {
            key: key.to_owned(),
            value: bytes,
            region: region.to_owned(),
            created_at: now,
            ttl_seconds,
        };
        if let Err(err) = self.bounded(backend.put(entry)).await {
            self.shared_counters.error();
            warn!(backend = backend.name(), region, key, error = %err, "shared cache write failed");
        }
    }

    /// Removes `key` from every tier of `region`.
    pub async fn invalidate(&self, key: &str, region: &str) {
        let policy = self.regions.policy(region);
        if policy.local {
            self.local.remove(region, key);
        }
        if !policy.shared {
            return;
        }
        if let Some(backend) = self.shared.as_ref() {
            if let Err(err) = self.bounded(backend.remove(region, key)).await {
                self.shared_counters.error();
                warn!(backend = backend.name(), region, key, error = %err, "shared cache invalidation failed");
            }
        }
    }

    /// Removes every entry expired at the current time. The shared tier is
    /// swept only when its backend does not expire entries itself.
    pub async fn cleanup_expired_entries(&self) -> CleanupReport {
        let now = self.clock.now();
        let local = self.local.purge_expired(now) as u64;
        self.local_counters.evicted(local);

        let mut shared = 0;
        if let Some(backend) = self.shared.as_ref() {
            if backend.has_native_expiry() {
                debug!(backend = backend.name(), "shared tier expires entries natively");
            } else {
                match self.bounded(backend.purge_expired(now)).await {
                    Ok(count) => {
                        self.shared_counters.evicted(count);
                        shared = count;
                    }
                    Err(err) => {
                        self.shared_counters.error();
                        warn!(backend = backend.name(), error = %err, "shared cache sweep failed");
                    }
                }
            }
        }

        CleanupReport { local, shared }
    }

    /// Returns counters per tier. The shared tier is reported only when one
    /// is attached.
    pub async fn get_statistics(&self) -> BTreeMap<Tier, TierStatistics> {
        let mut stats = BTreeMap::new();
        stats.insert(
            Tier::Local,
            self.local_counters.report(Some(self.local.len() as u64)),
        );

        if let Some(backend) = self.shared.as_ref() {
            let entries = match self.bounded(backend.entry_count()).await {
                Ok(count) => Some(count),
                Err(err) => {
                    self.shared_counters.error();
                    warn!(backend = backend.name(), error = %err, "shared cache count failed");
                    None
                }
            };
            stats.insert(Tier::Shared, self.shared_counters.report(entries));
        }

        stats
    }
}

/// Rounds a TTL up to whole seconds so a sub-second remainder never
/// shortens or drops an entry.
fn whole_seconds_up(ttl: Duration) -> u64 {
    ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("regions", &self.regions.names())
            .field("local", &self.local)
            .field("shared", &self.shared.as_ref().map(|b| b.name()))
            .field("shared_timeout", &self.shared_timeout)
            .finish_non_exhaustive()
    }
}
