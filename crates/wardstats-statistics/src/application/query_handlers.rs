//! Query handlers for the ward statistics context.
//!
//! Historical views are always replayed from the event log. Current views
//! are served cache-aside: a hit skips replay, a miss replays and populates
//! the cache.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use wardstats_cache::CacheService;
use wardstats_cache::region::{DEMOGRAPHIC_STATISTICS, ECONOMIC_STATISTICS, WARD_STATISTICS};
use wardstats_core::aggregate::StatisticalAggregate;
use wardstats_core::error::DomainError;
use wardstats_sourcing::EventSourcingEngine;

use crate::application::computations::{
    DemographicBreakdown, EconomicBreakdown, WardSummary, demographic_key, economic_key, stats_key,
};
use crate::domain::aggregates::WardStatistic;

/// Loads the ward with the last sequence number read, so a cached view can
/// be checked against writes that landed while it was computed.
async fn load_existing(
    engine: &EventSourcingEngine,
    ward_id: &str,
) -> Result<(WardStatistic, i64), DomainError> {
    let (ward, seen_sequence) = engine.load_for_update(WardStatistic::new(ward_id)).await?;
    if ward.version() == 0 {
        return Err(DomainError::AggregateNotFound(ward_id.to_owned()));
    }
    Ok((ward, seen_sequence))
}

/// Returns whether the ward's stream still ends at `seen_sequence`. A read
/// failure counts as changed.
pub(crate) async fn still_current(
    engine: &EventSourcingEngine,
    ward_id: &str,
    seen_sequence: i64,
) -> bool {
    match engine.store().last_sequence(ward_id).await {
        Ok(last) if last == seen_sequence => true,
        Ok(last) => {
            debug!(ward_id, seen_sequence, last, "ward changed while its view was computed");
            false
        }
        Err(err) => {
            warn!(ward_id, error = %err, "could not confirm ward is unchanged");
            false
        }
    }
}

/// Caches `value`, then drops it again if the ward gained events after
/// `seen_sequence`. A writer that appends before the check is caught here; one
/// that appends after it invalidates the entry itself.
async fn put_if_current<T>(
    engine: &EventSourcingEngine,
    cache: &CacheService,
    ward_id: &str,
    seen_sequence: i64,
    (key, region): (&str, &str),
    value: &T,
) where
    T: Serialize + Clone + Send + Sync + 'static,
{
    cache.put(key, value, None, region).await;
    if !still_current(engine, ward_id, seen_sequence).await {
        cache.invalidate(key, region).await;
    }
}

/// Returns the ward as it stood just before `cutoff`.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the ward has no history
/// before `cutoff`, or `DomainError::Storage` if the read fails.
pub async fn ward_view_as_of(
    ward_id: &str,
    cutoff: DateTime<Utc>,
    engine: &EventSourcingEngine,
) -> Result<WardSummary, DomainError> {
    let ward = engine
        .rebuild_entity(WardStatistic::new(ward_id), cutoff)
        .await?;
    if ward.version() == 0 {
        return Err(DomainError::AggregateNotFound(ward_id.to_owned()));
    }
    Ok(WardSummary::from(&ward))
}

/// Returns the ward's current summary, from cache when possible.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the ward has no history, or
/// `DomainError::Storage` if the read fails on a cache miss.
pub async fn current_ward_view(
    ward_id: &str,
    engine: &EventSourcingEngine,
    cache: &CacheService,
) -> Result<WardSummary, DomainError> {
    let key = stats_key(ward_id);
    if let Some(summary) = cache.get::<WardSummary>(&key, WARD_STATISTICS).await {
        return Ok(summary);
    }

    debug!(ward_id, "ward summary not cached, replaying");
    let (ward, seen_sequence) = load_existing(engine, ward_id).await?;
    let summary = WardSummary::from(&ward);
    put_if_current(engine, cache, ward_id, seen_sequence, (&key, WARD_STATISTICS), &summary).await;
    Ok(summary)
}

/// Returns the ward's current demographic breakdown, from cache when
/// possible.
///
/// # Errors
///
/// Same as [`current_ward_view`].
pub async fn current_demographics(
    ward_id: &str,
    engine: &EventSourcingEngine,
    cache: &CacheService,
) -> Result<DemographicBreakdown, DomainError> {
    let key = demographic_key(ward_id);
    if let Some(breakdown) = cache.get(&key, DEMOGRAPHIC_STATISTICS).await {
        return Ok(breakdown);
    }

    let (ward, seen_sequence) = load_existing(engine, ward_id).await?;
    let breakdown = DemographicBreakdown::from(&ward);
    put_if_current(
        engine,
        cache,
        ward_id,
        seen_sequence,
        (&key, DEMOGRAPHIC_STATISTICS),
        &breakdown,
    )
    .await;
    Ok(breakdown)
}

/// Returns the ward's current economic breakdown, from cache when possible.
///
/// # Errors
///
/// Same as [`current_ward_view`].
pub async fn current_economics(
    ward_id: &str,
    engine: &EventSourcingEngine,
    cache: &CacheService,
) -> Result<EconomicBreakdown, DomainError> {
    let key = economic_key(ward_id);
    if let Some(breakdown) = cache.get(&key, ECONOMIC_STATISTICS).await {
        return Ok(breakdown);
    }

    let (ward, seen_sequence) = load_existing(engine, ward_id).await?;
    let breakdown = EconomicBreakdown::from(&ward);
    put_if_current(
        engine,
        cache,
        ward_id,
        seen_sequence,
        (&key, ECONOMIC_STATISTICS),
        &breakdown,
    )
    .await;
    Ok(breakdown)
}
