//! Server error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use wardstats_core::error::DomainError;
use wardstats_scheduler::SchedulerError;

/// Startup errors for the server process.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable or config file entry is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A job could not be registered.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// The tracing pipeline could not be installed.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper that implements `IntoResponse`.
#[derive(Debug)]
pub enum ApiError {
    /// A replay or storage failure.
    Domain(DomainError),
    /// A job lookup or trigger failure.
    Scheduler(SchedulerError),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        Self::Scheduler(err)
    }
}

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Domain(err) => match err {
                DomainError::AggregateNotFound(_) => {
                    (StatusCode::NOT_FOUND, "aggregate_not_found")
                }
                DomainError::ConcurrencyConflict { .. } => {
                    (StatusCode::CONFLICT, "concurrency_conflict")
                }
                DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
                DomainError::Serialization(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
                }
                DomainError::Storage(_) => (StatusCode::SERVICE_UNAVAILABLE, "storage_error"),
            },
            Self::Scheduler(err) => match err {
                SchedulerError::UnknownJob(_) => (StatusCode::NOT_FOUND, "job_not_found"),
                SchedulerError::AlreadyRunning(_) => {
                    (StatusCode::CONFLICT, "job_already_running")
                }
                SchedulerError::InvalidCron { .. }
                | SchedulerError::DuplicateJob(_)
                | SchedulerError::RunInterrupted { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "scheduler_error")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.classify();
        let message = if status.is_server_error() {
            match &self {
                Self::Domain(err) => error!(error = %err, code = error_code, "request failed"),
                Self::Scheduler(err) => error!(error = %err, code = error_code, "request failed"),
            }
            internal_message(status).to_owned()
        } else {
            match &self {
                Self::Domain(err) => err.to_string(),
                Self::Scheduler(err) => err.to_string(),
            }
        };

        let body = ErrorBody {
            error: error_code,
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// Client-facing text for server-side failures; the details are only logged.
fn internal_message(status: StatusCode) -> &'static str {
    if status == StatusCode::SERVICE_UNAVAILABLE {
        "storage is temporarily unavailable"
    } else {
        "internal server error"
    }
}
