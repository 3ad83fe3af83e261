//! Registers the statistics jobs with the scheduler.

use std::sync::Arc;

use tracing::info;
use wardstats_cache::CacheService;
use wardstats_core::clock::Clock;
use wardstats_scheduler::{ScheduledJob, Scheduler, SchedulerError};
use wardstats_sourcing::EventSourcingEngine;
use wardstats_statistics::application::jobs::{
    CacheCleanupJob, PrecomputeStatisticsJob, TrendReportJob,
};

use crate::config::SchedulerConfig;

/// Builds a scheduler with every job that has a schedule in `config`.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidCron` when a configured expression does
/// not parse.
pub fn build_scheduler(
    config: &SchedulerConfig,
    engine: &Arc<EventSourcingEngine>,
    cache: &Arc<CacheService>,
    clock: Arc<dyn Clock>,
) -> Result<Scheduler, SchedulerError> {
    let scheduler = Scheduler::new(clock, config.workers);
    let jobs: [Arc<dyn ScheduledJob>; 3] = [
        Arc::new(PrecomputeStatisticsJob::new(Arc::clone(engine), Arc::clone(cache))),
        Arc::new(CacheCleanupJob::new(Arc::clone(cache))),
        Arc::new(TrendReportJob::new(Arc::clone(engine), Arc::clone(cache))),
    ];

    for job in jobs {
        let Some(schedule) = config.job(job.name()) else {
            info!(job = job.name(), "no schedule configured, job disabled");
            continue;
        };
        scheduler.register(job, &schedule.cron, schedule.max_duration())?;
    }
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};
    use wardstats_cache::CacheRegions;
    use wardstats_event_store::memory_event_store::InMemoryEventStore;
    use wardstats_statistics::application::jobs::{CACHE_CLEANUP, TREND_REPORT};
    use wardstats_test_support::FixedClock;

    use crate::config::JobSchedule;

    fn services(clock: &Arc<dyn Clock>) -> (Arc<EventSourcingEngine>, Arc<CacheService>) {
        let engine = Arc::new(EventSourcingEngine::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::clone(clock),
        ));
        let cache = Arc::new(CacheService::new(CacheRegions::default(), Arc::clone(clock)));
        (engine, cache)
    }

    #[test]
    fn test_default_config_registers_all_three_jobs() {
        // Arrange
        let clock: Arc<dyn Clock> =
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()));
        let (engine, cache) = services(&clock);

        // Act
        let scheduler =
            build_scheduler(&SchedulerConfig::default(), &engine, &cache, clock).unwrap();

        // Assert
        let names: Vec<String> = scheduler.snapshot().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["cache_cleanup", "precompute_statistics", "trend_report"]);
    }

    #[test]
    fn test_job_without_schedule_is_not_registered() {
        // Arrange
        let clock: Arc<dyn Clock> =
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()));
        let (engine, cache) = services(&clock);
        let mut config = SchedulerConfig::default();
        config.jobs.remove(TREND_REPORT);

        // Act
        let scheduler = build_scheduler(&config, &engine, &cache, clock).unwrap();

        // Assert
        assert!(scheduler.snapshot().iter().all(|s| s.name != TREND_REPORT));
    }

    #[test]
    fn test_invalid_cron_fails_registration() {
        // Arrange
        let clock: Arc<dyn Clock> =
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()));
        let (engine, cache) = services(&clock);
        let mut config = SchedulerConfig::default();
        config.jobs.insert(
            CACHE_CLEANUP.to_owned(),
            JobSchedule {
                cron: "every hour".to_owned(),
                max_duration_secs: 60,
            },
        );

        // Act
        let result = build_scheduler(&config, &engine, &cache, clock);

        // Assert
        assert!(matches!(result, Err(SchedulerError::InvalidCron { .. })));
    }
}
