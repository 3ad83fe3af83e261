//! Clock abstraction used for event timestamps, TTL checks, and scheduling.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of "now". Injected everywhere time matters so replay cutoffs,
/// cache expiry, and cron triggers can be driven deterministically in tests.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Shared, type-erased clock handle.
pub type SharedClock = Arc<dyn Clock>;
