//! Shared test helpers for server integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;
use wardstats_cache::{CacheRegions, CacheService, InMemorySharedCache};
use wardstats_core::clock::Clock;
use wardstats_event_store::memory_event_store::InMemoryEventStore;
use wardstats_scheduler::Scheduler;
use wardstats_server::build_router;
use wardstats_server::config::SchedulerConfig;
use wardstats_server::scheduling::build_scheduler;
use wardstats_server::state::AppState;
use wardstats_sourcing::EventSourcingEngine;
use wardstats_test_support::ManualClock;

/// Start instant shared across server tests.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// Services behind a test router, exposed for arranging state directly.
pub struct TestContext {
    pub clock: Arc<ManualClock>,
    pub engine: Arc<EventSourcingEngine>,
    pub cache: Arc<CacheService>,
    pub scheduler: Scheduler,
}

impl TestContext {
    /// Wires in-memory stores and the default job table. Uses the same
    /// router as `main.rs`.
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(start()));
        let shared_clock: Arc<dyn Clock> = clock.clone();
        let engine = Arc::new(EventSourcingEngine::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::clone(&shared_clock),
        ));
        let cache = Arc::new(
            CacheService::new(CacheRegions::default(), Arc::clone(&shared_clock))
                .with_shared_tier(Arc::new(InMemorySharedCache::new())),
        );
        let scheduler =
            build_scheduler(&SchedulerConfig::default(), &engine, &cache, shared_clock).unwrap();

        Self {
            clock,
            engine,
            cache,
            scheduler,
        }
    }

    /// Builds a fresh router over the shared services.
    pub fn app(&self) -> Router {
        build_router(AppState::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.cache),
            self.scheduler.clone(),
        ))
    }
}

/// Send a POST request with no body and return the response.
pub async fn post_empty(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
