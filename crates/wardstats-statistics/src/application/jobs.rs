//! Background jobs that keep the ward statistic views warm.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use wardstats_cache::CacheService;
use wardstats_cache::region::{
    DEMOGRAPHIC_STATISTICS, ECONOMIC_STATISTICS, TREND_ARCHIVE, WARD_STATISTICS,
};
use wardstats_core::aggregate::StatisticalAggregate;
use wardstats_core::clock::Clock;
use wardstats_scheduler::{JobError, ScheduledJob};
use wardstats_sourcing::EventSourcingEngine;

use crate::application::computations::{
    DemographicBreakdown, EconomicBreakdown, OVERVIEW_KEY, TrendSnapshot, WardSummary,
    WardsOverview, demographic_key, economic_key, month_start, stats_key, trend_key,
};
use crate::application::command_handlers::invalidate_ward_views;
use crate::application::query_handlers::still_current;
use crate::domain::aggregates::WardStatistic;

/// Name of [`PrecomputeStatisticsJob`].
pub const PRECOMPUTE_STATISTICS: &str = "precompute_statistics";
/// Name of [`CacheCleanupJob`].
pub const CACHE_CLEANUP: &str = "cache_cleanup";
/// Name of [`TrendReportJob`].
pub const TREND_REPORT: &str = "trend_report";

async fn ward_ids(engine: &EventSourcingEngine) -> Result<Vec<String>, JobError> {
    Ok(engine
        .store()
        .entity_ids(WardStatistic::entity_type())
        .await?)
}

/// Rebuilds every ward and writes its summary, both breakdowns, and the
/// cross-ward overview into the cache.
#[derive(Debug)]
pub struct PrecomputeStatisticsJob {
    engine: Arc<EventSourcingEngine>,
    cache: Arc<CacheService>,
}

impl PrecomputeStatisticsJob {
    /// Creates the job.
    #[must_use]
    pub fn new(engine: Arc<EventSourcingEngine>, cache: Arc<CacheService>) -> Self {
        Self { engine, cache }
    }
}

#[async_trait]
impl ScheduledJob for PrecomputeStatisticsJob {
    fn name(&self) -> &str {
        PRECOMPUTE_STATISTICS
    }

    async fn run(&self) -> Result<String, JobError> {
        let ids = ward_ids(&self.engine).await?;
        let mut summaries = Vec::with_capacity(ids.len());
        let mut failed = 0_usize;
        let mut changed = 0_usize;

        for id in &ids {
            let (ward, seen_sequence) =
                match self.engine.load_for_update(WardStatistic::new(id.as_str())).await {
                    Ok((ward, seen)) if ward.version() > 0 => (ward, seen),
                    Ok(_) => continue,
                    Err(err) => {
                        warn!(ward_id = %id, error = %err, "skipping ward during precomputation");
                        failed += 1;
                        continue;
                    }
                };

            let summary = WardSummary::from(&ward);
            self.cache
                .put(&stats_key(id), &summary, None, WARD_STATISTICS)
                .await;
            self.cache
                .put(
                    &demographic_key(id),
                    &DemographicBreakdown::from(&ward),
                    None,
                    DEMOGRAPHIC_STATISTICS,
                )
                .await;
            self.cache
                .put(
                    &economic_key(id),
                    &EconomicBreakdown::from(&ward),
                    None,
                    ECONOMIC_STATISTICS,
                )
                .await;
            if !still_current(&self.engine, id, seen_sequence).await {
                invalidate_ward_views(&self.cache, id).await;
                changed += 1;
                continue;
            }
            summaries.push(summary);
        }

        if changed == 0 {
            let overview = WardsOverview::from_summaries(&summaries, self.engine.clock().now());
            self.cache
                .put(OVERVIEW_KEY, &overview, None, WARD_STATISTICS)
                .await;
        } else {
            info!(changed, "wards changed during precomputation, overview left to the next run");
        }

        info!(wards = summaries.len(), failed, changed, "statistics precomputed");
        Ok(format!(
            "precomputed {} wards ({failed} failed, {changed} changed)",
            summaries.len()
        ))
    }
}

/// Sweeps expired entries out of both cache tiers.
#[derive(Debug)]
pub struct CacheCleanupJob {
    cache: Arc<CacheService>,
}

impl CacheCleanupJob {
    /// Creates the job.
    #[must_use]
    pub fn new(cache: Arc<CacheService>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ScheduledJob for CacheCleanupJob {
    fn name(&self) -> &str {
        CACHE_CLEANUP
    }

    async fn run(&self) -> Result<String, JobError> {
        let report = self.cache.cleanup_expired_entries().await;
        info!(
            local = report.local,
            shared = report.shared,
            "expired cache entries purged"
        );
        Ok(format!(
            "purged {} expired entries (local {}, shared {})",
            report.total(),
            report.local,
            report.shared
        ))
    }
}

/// Archives population movement since the start of the current month under
/// a dated key in the long-lived `trend_archive` region.
#[derive(Debug)]
pub struct TrendReportJob {
    engine: Arc<EventSourcingEngine>,
    cache: Arc<CacheService>,
}

impl TrendReportJob {
    /// Creates the job.
    #[must_use]
    pub fn new(engine: Arc<EventSourcingEngine>, cache: Arc<CacheService>) -> Self {
        Self { engine, cache }
    }
}

#[async_trait]
impl ScheduledJob for TrendReportJob {
    fn name(&self) -> &str {
        TREND_REPORT
    }

    async fn run(&self) -> Result<String, JobError> {
        let now = self.engine.clock().now();
        let cutoff = month_start(now)
            .ok_or_else(|| JobError::Failed(format!("no month start for {now}")))?;

        let mut pairs = Vec::new();
        for id in ward_ids(&self.engine).await? {
            let then = self
                .engine
                .rebuild_entity(WardStatistic::new(id.as_str()), cutoff)
                .await?;
            let current = self.engine.load_current(WardStatistic::new(id)).await?;
            pairs.push((then, current));
        }

        let snapshot = TrendSnapshot::compute(cutoff, &pairs);
        let key = trend_key(snapshot.reference_date);
        self.cache.put(&key, &snapshot, None, TREND_ARCHIVE).await;

        info!(key = %key, wards = snapshot.wards.len(), "trend snapshot archived");
        Ok(format!("archived {key} covering {} wards", snapshot.wards.len()))
    }
}
