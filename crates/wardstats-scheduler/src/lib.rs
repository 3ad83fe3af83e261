//! Scheduled job runner.
//!
//! Jobs are registered with a cron expression and a maximum duration. The
//! [`Scheduler`] owns the job table and a fixed-size worker pool; each due
//! job runs in its own task under a timeout, and its outcome is recorded and
//! logged rather than propagated.

pub mod error;
pub mod job;
pub mod scheduler;

pub use error::SchedulerError;
pub use job::{JobError, JobRunRecord, JobStatus, ScheduledJob};
pub use scheduler::{JobSnapshot, Scheduler};
