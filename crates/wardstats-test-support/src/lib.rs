//! Shared test doubles and utilities for the ward statistics workspace.

mod cache;
mod clock;
mod store;

pub use cache::{SlowSharedCache, UnavailableSharedCache};
pub use clock::{FixedClock, ManualClock};
pub use store::{FailingEventStore, FlakyEventStore, YieldingEventStore};
