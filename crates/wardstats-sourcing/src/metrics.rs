//! Replay counters.
//!
//! Events skipped during replay (retired tags, malformed payloads) are
//! counted per tag so operators can see when historical views omit changes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

/// Live replay counters owned by the engine.
#[derive(Debug, Default)]
pub struct ReplayMetrics {
    replayed: AtomicU64,
    skipped: AtomicU64,
    skipped_by_type: Mutex<BTreeMap<String, u64>>,
}

/// Point-in-time copy of [`ReplayMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayMetricsSnapshot {
    /// Events decoded and handed to aggregates.
    pub replayed: u64,
    /// Events skipped because they could not be decoded.
    pub skipped: u64,
    /// Skipped events broken down by event type tag.
    pub skipped_by_type: BTreeMap<String, u64>,
}

impl ReplayMetrics {
    pub(crate) fn record_replayed(&self, count: usize) {
        self.replayed
            .fetch_add(u64::try_from(count).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self, event_type: &str) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        *self
            .skipped_by_type
            .lock()
            .entry(event_type.to_owned())
            .or_insert(0) += 1;
    }

    /// Returns a copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> ReplayMetricsSnapshot {
        ReplayMetricsSnapshot {
            replayed: self.replayed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            skipped_by_type: self.skipped_by_type.lock().clone(),
        }
    }
}
