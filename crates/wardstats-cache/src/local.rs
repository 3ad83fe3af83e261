//! Process-local tier.
//!
//! An owned, mutex-guarded map of native values with a capacity bound. When
//! full, an insert first sweeps expired entries and then evicts the entry
//! closest to expiry.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::entry::expires_at;

const KEY_SEPARATOR: &str = "\u{1F}";

/// Default maximum number of local entries.
pub const DEFAULT_LOCAL_CAPACITY: usize = 10_000;

/// A type-erased cached value.
pub type LocalValue = Arc<dyn Any + Send + Sync>;

struct LocalEntry {
    value: LocalValue,
    expires_at: DateTime<Utc>,
}

/// The in-process tier.
pub struct LocalTier {
    entries: Mutex<HashMap<String, LocalEntry>>,
    capacity: usize,
}

impl LocalTier {
    /// Creates a tier holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Returns the live value, dropping it if it expired.
    pub fn get(&self, region: &str, key: &str, now: DateTime<Utc>) -> Option<LocalValue> {
        let key = make_key(region, key);
        let mut guard = self.entries.lock();
        match guard.get(&key) {
            Some(entry) if now < entry.expires_at => Some(Arc::clone(&entry.value)),
            Some(_) => {
                guard.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Stores a value that expires at `created_at + ttl_seconds`. Returns how
    /// many other entries were evicted to make room.
    pub fn insert(
        &self,
        region: &str,
        key: &str,
        value: LocalValue,
        created_at: DateTime<Utc>,
        ttl_seconds: u64,
        now: DateTime<Utc>,
    ) -> usize {
        let key = make_key(region, key);
        let mut guard = self.entries.lock();
        let mut evicted = 0;

        if !guard.contains_key(&key) && guard.len() >= self.capacity {
            evicted += sweep(&mut guard, now);
            if guard.len() >= self.capacity {
                let soonest = guard
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(victim) = soonest {
                    guard.remove(&victim);
                    evicted += 1;
                }
            }
        }

        guard.insert(
            key,
            LocalEntry {
                value,
                expires_at: expires_at(created_at, ttl_seconds),
            },
        );
        evicted
    }

    /// Removes one entry. Returns whether it was present.
    pub fn remove(&self, region: &str, key: &str) -> bool {
        self.entries.lock().remove(&make_key(region, key)).is_some()
    }

    /// Removes every entry expired at `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        sweep(&mut self.entries.lock(), now)
    }

    /// Returns the number of entries held, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns whether the tier is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for LocalTier {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_CAPACITY)
    }
}

impl std::fmt::Debug for LocalTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTier")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

fn sweep(entries: &mut HashMap<String, LocalEntry>, now: DateTime<Utc>) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| now < entry.expires_at);
    before - entries.len()
}

fn make_key(region: &str, key: &str) -> String {
    format!("{region}{KEY_SEPARATOR}{key}")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn value(n: i64) -> LocalValue {
        Arc::new(n)
    }

    fn read(tier: &LocalTier, key: &str, now: DateTime<Utc>) -> Option<i64> {
        tier.get("r", key, now)
            .and_then(|v| v.downcast::<i64>().ok())
            .map(|v| *v)
    }

    #[test]
    fn test_get_honours_expiry_lazily() {
        let tier = LocalTier::default();
        tier.insert("r", "k", value(1), t0(), 60, t0());

        assert_eq!(read(&tier, "k", t0() + TimeDelta::seconds(59)), Some(1));
        assert_eq!(read(&tier, "k", t0() + TimeDelta::seconds(60)), None);
        assert!(tier.is_empty());
    }

    #[test]
    fn test_regions_do_not_share_keys() {
        let tier = LocalTier::default();
        tier.insert("a", "k", value(1), t0(), 60, t0());

        assert!(tier.get("b", "k", t0()).is_none());
        assert!(tier.get("a", "k", t0()).is_some());
    }

    #[test]
    fn test_purge_removes_only_expired_entries() {
        let tier = LocalTier::default();
        tier.insert("r", "short", value(1), t0(), 10, t0());
        tier.insert("r", "long", value(2), t0(), 100, t0());

        let purged = tier.purge_expired(t0() + TimeDelta::seconds(10));

        assert_eq!(purged, 1);
        assert_eq!(tier.len(), 1);
        assert_eq!(read(&tier, "long", t0() + TimeDelta::seconds(10)), Some(2));
    }

    #[test]
    fn test_full_tier_evicts_soonest_expiring_entry() {
        // Arrange
        let tier = LocalTier::new(2);
        tier.insert("r", "soon", value(1), t0(), 10, t0());
        tier.insert("r", "later", value(2), t0(), 100, t0());

        // Act
        let evicted = tier.insert("r", "new", value(3), t0(), 50, t0());

        // Assert
        assert_eq!(evicted, 1);
        assert_eq!(tier.len(), 2);
        assert_eq!(read(&tier, "soon", t0()), None);
        assert_eq!(read(&tier, "later", t0()), Some(2));
        assert_eq!(read(&tier, "new", t0()), Some(3));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let tier = LocalTier::new(1);
        tier.insert("r", "k", value(1), t0(), 10, t0());

        let evicted = tier.insert("r", "k", value(2), t0(), 10, t0());

        assert_eq!(evicted, 0);
        assert_eq!(read(&tier, "k", t0()), Some(2));
    }
}
