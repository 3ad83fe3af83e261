//! Per-tier counters for observability.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// A storage layer in the cache hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Process-local tier.
    Local,
    /// Shared tier.
    Shared,
}

/// Counters reported for one tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TierStatistics {
    /// Entries currently held, when the tier could report it.
    pub entries: Option<u64>,
    /// Reads served by this tier.
    pub hits: u64,
    /// Reads this tier could not serve.
    pub misses: u64,
    /// Failed operations against this tier.
    pub errors: u64,
    /// Entries removed by expiry sweeps or capacity eviction.
    pub evictions: u64,
}

#[derive(Debug, Default)]
pub(crate) struct TierCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    evictions: AtomicU64,
}

impl TierCounters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn evicted(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn report(&self, entries: Option<u64>) -> TierStatistics {
        TierStatistics {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
