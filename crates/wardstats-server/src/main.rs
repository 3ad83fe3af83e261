//! Ward statistics server entry point.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use wardstats_cache::CacheService;
use wardstats_cache::pg_shared::PgSharedCache;
use wardstats_core::clock::{Clock, SystemClock};
use wardstats_event_store::pg_event_store::PgEventStore;
use wardstats_server::config::ServerConfig;
use wardstats_server::error::AppError;
use wardstats_server::state::AppState;
use wardstats_server::{build_router, scheduling, telemetry};
use wardstats_sourcing::EventSourcingEngine;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let telemetry = telemetry::init(std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok())?;

    let result = run().await;
    if let Err(err) = &result {
        error!(error = %err, "server exited with error");
    }
    telemetry.shutdown();
    result
}

async fn run() -> Result<(), AppError> {
    let config = ServerConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("database migrations applied");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = Arc::new(EventSourcingEngine::new(
        Arc::new(PgEventStore::new(pool.clone())),
        Arc::clone(&clock),
    ));
    let cache = Arc::new(
        CacheService::new(config.regions.clone(), Arc::clone(&clock))
            .with_shared_tier(Arc::new(PgSharedCache::new(pool)))
            .with_shared_timeout(config.shared_cache_timeout),
    );

    let scheduler = scheduling::build_scheduler(&config.scheduler, &engine, &cache, clock)?;
    scheduler.start(config.scheduler.tick_interval);
    info!(
        workers = config.scheduler.workers,
        jobs = scheduler.snapshot().len(),
        "scheduler started"
    );

    let app = build_router(AppState::new(engine, cache, scheduler.clone()));

    let addr = config.bind_address();
    info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    scheduler.shutdown().await;
    info!("scheduler stopped");
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
