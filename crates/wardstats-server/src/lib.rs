//! Ward statistics server: configuration, tracing, scheduled jobs, and the
//! ops HTTP surface.

pub mod config;
pub mod error;
pub mod routes;
pub mod scheduling;
pub mod state;
pub mod telemetry;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assembles every route with request tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/ops", routes::ops::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
