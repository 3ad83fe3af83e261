//! The job table, tick loop, and worker pool.

use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use cron::Schedule;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use wardstats_core::clock::Clock;

use crate::error::SchedulerError;
use crate::job::{JobRunRecord, JobStatus, ScheduledJob};

/// Default size of the worker pool.
pub const DEFAULT_WORKERS: usize = 4;

/// Number of run records kept for inspection.
const HISTORY_LIMIT: usize = 200;

struct JobSlot {
    job: Arc<dyn ScheduledJob>,
    cron_expression: String,
    schedule: Schedule,
    max_duration: Duration,
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
    running: Arc<AtomicBool>,
}

/// Point-in-time view of one row of the job table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    /// Job name.
    pub name: String,
    /// Cron expression the job was registered with.
    pub cron_expression: String,
    /// Maximum run duration in milliseconds.
    pub max_duration_ms: u64,
    /// Last trigger time.
    pub last_run: Option<DateTime<Utc>>,
    /// Next trigger time, if the schedule has one.
    pub next_run: Option<DateTime<Utc>>,
    /// Whether a run is in progress.
    pub running: bool,
}

struct Inner {
    jobs: Mutex<BTreeMap<String, JobSlot>>,
    workers: Arc<Semaphore>,
    worker_count: usize,
    clock: Arc<dyn Clock>,
    history: Mutex<VecDeque<JobRunRecord>>,
    shutdown_tx: watch::Sender<bool>,
    is_running: AtomicBool,
    tick_loop: Mutex<Option<JoinHandle<()>>>,
}

/// Clears a job's running flag when its run ends, however it ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Cron-driven job runner.
///
/// Cloning yields another handle to the same job table and worker pool.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Creates a scheduler with `workers` concurrent run slots (minimum 1).
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, workers: usize) -> Self {
        let worker_count = workers.max(1);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(BTreeMap::new()),
                workers: Arc::new(Semaphore::new(worker_count)),
                worker_count,
                clock,
                history: Mutex::new(VecDeque::new()),
                shutdown_tx,
                is_running: AtomicBool::new(false),
                tick_loop: Mutex::new(None),
            }),
        }
    }

    /// Adds `job` to the table, triggered by `cron_expression` (seconds
    /// field first) and abandoned after `max_duration`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidCron` if the expression does not parse,
    /// or `SchedulerError::DuplicateJob` if the name is taken.
    pub fn register(
        &self,
        job: Arc<dyn ScheduledJob>,
        cron_expression: &str,
        max_duration: Duration,
    ) -> Result<(), SchedulerError> {
        let name = job.name().to_owned();
        let schedule =
            Schedule::from_str(cron_expression).map_err(|source| SchedulerError::InvalidCron {
                job: name.clone(),
                expression: cron_expression.to_owned(),
                source,
            })?;

        let mut jobs = self.inner.jobs.lock();
        if jobs.contains_key(&name) {
            return Err(SchedulerError::DuplicateJob(name));
        }

        let next_run = schedule.after(&self.inner.clock.now()).next();
        info!(job = %name, cron = cron_expression, next_run = ?next_run, "job registered");
        jobs.insert(
            name,
            JobSlot {
                job,
                cron_expression: cron_expression.to_owned(),
                schedule,
                max_duration,
                last_run: None,
                next_run,
                running: Arc::new(AtomicBool::new(false)),
            },
        );
        Ok(())
    }

    /// Dispatches every job due at `now` and returns the handles of the
    /// dispatched runs. A job whose previous run is still in progress is
    /// skipped for this trigger.
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<JoinHandle<JobRunRecord>> {
        let mut due = Vec::new();
        {
            let mut jobs = self.inner.jobs.lock();
            for (name, slot) in jobs.iter_mut() {
                if slot.next_run.is_none_or(|next| next > now) {
                    continue;
                }
                slot.next_run = slot.schedule.after(&now).next();
                if slot.running.swap(true, Ordering::SeqCst) {
                    warn!(job = %name, "previous run still in progress, skipping trigger");
                    continue;
                }
                slot.last_run = Some(now);
                due.push((
                    Arc::clone(&slot.job),
                    slot.max_duration,
                    RunningGuard(Arc::clone(&slot.running)),
                ));
            }
        }

        due.into_iter()
            .map(|(job, max_duration, guard)| self.dispatch(job, max_duration, guard))
            .collect()
    }

    /// Spawns one run. The guard and the worker permit live inside the
    /// spawned task, so the run stays bounded however long anyone waits on it.
    fn dispatch(
        &self,
        job: Arc<dyn ScheduledJob>,
        max_duration: Duration,
        guard: RunningGuard,
    ) -> JoinHandle<JobRunRecord> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.execute(job, max_duration, guard).await })
    }

    /// Runs `name` immediately, outside its schedule, and waits for the
    /// outcome. Dropping the returned future stops the wait, not the run.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::UnknownJob` for an unregistered name,
    /// `SchedulerError::AlreadyRunning` if a run is in progress, or
    /// `SchedulerError::RunInterrupted` if the run's task was torn down.
    pub async fn run_now(&self, name: &str) -> Result<JobRunRecord, SchedulerError> {
        let (job, max_duration, guard) = {
            let mut jobs = self.inner.jobs.lock();
            let slot = jobs
                .get_mut(name)
                .ok_or_else(|| SchedulerError::UnknownJob(name.to_owned()))?;
            if slot.running.swap(true, Ordering::SeqCst) {
                return Err(SchedulerError::AlreadyRunning(name.to_owned()));
            }
            slot.last_run = Some(self.inner.clock.now());
            (
                Arc::clone(&slot.job),
                slot.max_duration,
                RunningGuard(Arc::clone(&slot.running)),
            )
        };
        self.dispatch(job, max_duration, guard)
            .await
            .map_err(|err| SchedulerError::RunInterrupted {
                job: name.to_owned(),
                reason: err.to_string(),
            })
    }

    /// Starts the tick loop, checking for due jobs every `tick_interval`
    /// until [`shutdown`](Self::shutdown).
    pub fn start(&self, tick_interval: Duration) {
        if self
            .inner
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("scheduler already started");
            return;
        }

        self.inner.shutdown_tx.send_replace(false);
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        let scheduler = self.clone();
        let period = tick_interval.max(Duration::from_millis(1));

        info!(
            tick_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            workers = self.inner.worker_count,
            jobs = self.inner.jobs.lock().len(),
            "scheduler started"
        );

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = scheduler.inner.clock.now();
                        scheduler.tick(now);
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("scheduler tick loop stopped");
        });
        *self.inner.tick_loop.lock() = Some(handle);
    }

    /// Stops the tick loop and waits for in-flight runs to release their
    /// workers.
    pub async fn shutdown(&self) {
        if self.inner.is_running.swap(false, Ordering::SeqCst) {
            self.inner.shutdown_tx.send_replace(true);
            let handle = self.inner.tick_loop.lock().take();
            if let Some(handle) = handle {
                if let Err(err) = handle.await {
                    warn!(error = %err, "scheduler tick loop ended abnormally");
                }
            }
        } else {
            warn!("scheduler not running");
        }

        let permits = u32::try_from(self.inner.worker_count).unwrap_or(u32::MAX);
        if self.inner.workers.acquire_many(permits).await.is_err() {
            warn!("worker pool closed before drain");
        }
        info!("scheduler stopped");
    }

    /// Returns whether the tick loop is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.is_running.load(Ordering::SeqCst)
    }

    /// Returns the job table, ordered by job name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        self.inner
            .jobs
            .lock()
            .iter()
            .map(|(name, slot)| JobSnapshot {
                name: name.clone(),
                cron_expression: slot.cron_expression.clone(),
                max_duration_ms: u64::try_from(slot.max_duration.as_millis()).unwrap_or(u64::MAX),
                last_run: slot.last_run,
                next_run: slot.next_run,
                running: slot.running.load(Ordering::SeqCst),
            })
            .collect()
    }

    /// Returns the most recent run records, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<JobRunRecord> {
        self.inner.history.lock().iter().cloned().collect()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("jobs", &self.inner.jobs.lock().keys().cloned().collect::<Vec<_>>())
            .field("workers", &self.inner.worker_count)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Inner {
    async fn execute(
        &self,
        job: Arc<dyn ScheduledJob>,
        max_duration: Duration,
        _running: RunningGuard,
    ) -> JobRunRecord {
        let name = job.name().to_owned();
        let permit = Arc::clone(&self.workers).acquire_owned().await;
        let started_at = self.clock.now();
        let started = Instant::now();
        info!(job = %name, "job started");

        let status = if let Ok(_permit) = permit {
            run_contained(job, max_duration).await
        } else {
            JobStatus::Failed("worker pool closed".to_owned())
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &status {
            JobStatus::Succeeded(summary) => {
                info!(job = %name, elapsed_ms, summary = %summary, "job succeeded");
            }
            JobStatus::Failed(reason) => {
                error!(job = %name, elapsed_ms, error = %reason, "job failed");
            }
            JobStatus::TimedOut => {
                error!(
                    job = %name,
                    elapsed_ms,
                    max_duration_ms = u64::try_from(max_duration.as_millis()).unwrap_or(u64::MAX),
                    "job exceeded its maximum duration and was abandoned"
                );
            }
        }

        let record = JobRunRecord {
            job: name,
            started_at,
            finished_at: self.clock.now(),
            status,
        };
        let mut history = self.history.lock();
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(record.clone());
        record
    }
}

async fn run_contained(job: Arc<dyn ScheduledJob>, max_duration: Duration) -> JobStatus {
    let task = tokio::spawn(async move { job.run().await });
    let abort = task.abort_handle();

    match tokio::time::timeout(max_duration, task).await {
        Ok(Ok(Ok(summary))) => JobStatus::Succeeded(summary),
        Ok(Ok(Err(err))) => JobStatus::Failed(err.to_string()),
        Ok(Err(join_err)) if join_err.is_panic() => JobStatus::Failed(format!(
            "job panicked: {}",
            panic_message(&*join_err.into_panic())
        )),
        Ok(Err(join_err)) => JobStatus::Failed(format!("job cancelled: {join_err}")),
        Err(_) => {
            abort.abort();
            JobStatus::TimedOut
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}
