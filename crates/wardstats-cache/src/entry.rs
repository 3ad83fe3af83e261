//! Serialized cache entries as held by the shared tier.

use chrono::{DateTime, TimeDelta, Utc};

/// One serialized cache entry.
///
/// An entry is visible strictly before `created_at + ttl_seconds`; from that
/// instant on it is expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Cache key, unique within its region.
    pub key: String,
    /// Serialized payload.
    pub value: Vec<u8>,
    /// Region the entry belongs to.
    pub region: String,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
    /// Lifetime in seconds.
    pub ttl_seconds: u64,
}

impl CacheEntry {
    /// Returns the first instant at which the entry is expired.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        expires_at(self.created_at, self.ttl_seconds)
    }

    /// Returns whether the entry must no longer be served at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Computes `created_at + ttl_seconds`, saturating at the maximum timestamp.
#[must_use]
pub fn expires_at(created_at: DateTime<Utc>, ttl_seconds: u64) -> DateTime<Utc> {
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|ttl| created_at.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
