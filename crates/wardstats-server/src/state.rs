//! Shared application state.

use std::sync::Arc;

use wardstats_cache::CacheService;
use wardstats_scheduler::Scheduler;
use wardstats_sourcing::EventSourcingEngine;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Event persistence and replay.
    pub engine: Arc<EventSourcingEngine>,
    /// Two-tier view cache.
    pub cache: Arc<CacheService>,
    /// Background job runner.
    pub scheduler: Scheduler,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        engine: Arc<EventSourcingEngine>,
        cache: Arc<CacheService>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            engine,
            cache,
            scheduler,
        }
    }
}
