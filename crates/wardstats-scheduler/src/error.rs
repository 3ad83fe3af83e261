//! Scheduler error types.

use thiserror::Error;

/// Errors raised when registering or triggering jobs.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cron expression could not be parsed.
    #[error("invalid cron expression {expression:?} for job {job}: {source}")]
    InvalidCron {
        /// Job being registered.
        job: String,
        /// The rejected expression.
        expression: String,
        /// Parser error.
        #[source]
        source: cron::error::Error,
    },

    /// A job with the same name is already registered.
    #[error("job already registered: {0}")]
    DuplicateJob(String),

    /// No job with this name is registered.
    #[error("unknown job: {0}")]
    UnknownJob(String),

    /// The job is still running from an earlier trigger.
    #[error("job already running: {0}")]
    AlreadyRunning(String),

    /// The task driving a run ended before reporting an outcome.
    #[error("run of job {job} was interrupted: {reason}")]
    RunInterrupted {
        /// Job whose run was lost.
        job: String,
        /// Why the task ended.
        reason: String,
    },
}
