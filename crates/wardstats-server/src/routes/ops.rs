//! Operational endpoints: cache and replay counters, job control, and ward
//! inspection.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wardstats_cache::{Tier, TierStatistics};
use wardstats_scheduler::{JobRunRecord, JobSnapshot};
use wardstats_sourcing::ReplayMetricsSnapshot;
use wardstats_statistics::application::computations::WardSummary;
use wardstats_statistics::application::query_handlers;

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for `GET /ops/jobs`.
#[derive(Debug, Serialize)]
pub struct JobsResponse {
    /// Registered jobs with their next trigger.
    pub jobs: Vec<JobSnapshot>,
    /// Recent runs, oldest first.
    pub recent_runs: Vec<JobRunRecord>,
}

/// Query parameters for `GET /ops/wards/{ward_id}`.
#[derive(Debug, Deserialize)]
pub struct WardViewParams {
    /// Replay only events recorded before this instant.
    pub as_of: Option<DateTime<Utc>>,
}

/// GET /ops/cache/statistics
async fn cache_statistics(
    State(state): State<AppState>,
) -> Json<BTreeMap<Tier, TierStatistics>> {
    Json(state.cache.get_statistics().await)
}

/// GET /ops/replay/metrics
async fn replay_metrics(State(state): State<AppState>) -> Json<ReplayMetricsSnapshot> {
    Json(state.engine.replay_metrics())
}

/// GET /ops/jobs
async fn list_jobs(State(state): State<AppState>) -> Json<JobsResponse> {
    Json(JobsResponse {
        jobs: state.scheduler.snapshot(),
        recent_runs: state.scheduler.history(),
    })
}

/// POST /ops/jobs/{name}/run
async fn run_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<JobRunRecord>, ApiError> {
    let record = state.scheduler.run_now(&name).await?;
    Ok(Json(record))
}

/// GET /ops/wards/{ward_id}
async fn ward_view(
    State(state): State<AppState>,
    Path(ward_id): Path<String>,
    Query(params): Query<WardViewParams>,
) -> Result<Json<WardSummary>, ApiError> {
    let summary = match params.as_of {
        Some(cutoff) => query_handlers::ward_view_as_of(&ward_id, cutoff, &state.engine).await?,
        None => query_handlers::current_ward_view(&ward_id, &state.engine, &state.cache).await?,
    };
    Ok(Json(summary))
}

/// Returns the ops router, mounted under `/ops`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cache/statistics", get(cache_statistics))
        .route("/replay/metrics", get(replay_metrics))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{name}/run", post(run_job))
        .route("/wards/{ward_id}", get(ward_view))
}
