//! Job contract and run records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use wardstats_core::error::DomainError;

/// Failure of a single job run.
#[derive(Debug, Error)]
pub enum JobError {
    /// A domain operation the job depends on failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Any other failure, described for the run log.
    #[error("{0}")]
    Failed(String),
}

/// A unit of background work.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Unique job name, used in the job table and in logs.
    fn name(&self) -> &str;

    /// Performs one run and returns a one-line summary of what it did.
    async fn run(&self) -> Result<String, JobError>;
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum JobStatus {
    /// The job finished and reported a summary.
    Succeeded(String),
    /// The job returned an error or panicked.
    Failed(String),
    /// The job exceeded its maximum duration and was abandoned.
    TimedOut,
}

/// Record of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRunRecord {
    /// Job name.
    pub job: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished or was abandoned.
    pub finished_at: DateTime<Utc>,
    /// Outcome.
    pub status: JobStatus,
}

impl JobRunRecord {
    /// Returns whether the run succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.status, JobStatus::Succeeded(_))
    }
}
