//! Two-tier cache for computed statistics.
//!
//! A process-local tier keeps native values; a shared tier (PostgreSQL or
//! in-memory) keeps serialized payloads. Named regions decide TTLs, which
//! tiers participate, and the shared-tier payload format. The cache is an
//! optimization only: every failure of the shared tier degrades to the local
//! tier instead of reaching the caller.

pub mod entry;
pub mod error;
pub mod local;
pub mod pg_shared;
pub mod region;
pub mod service;
pub mod shared;
pub mod stats;

pub use entry::CacheEntry;
pub use error::CacheError;
pub use region::{CacheRegions, PayloadFormat, RegionPolicy};
pub use service::{CacheService, CleanupReport};
pub use shared::{InMemorySharedCache, SharedCacheBackend};
pub use stats::{Tier, TierStatistics};
