//! Command handlers for the ward statistics context.
//!
//! Each handler reconstitutes the ward from its full stream, applies the
//! command, persists the resulting events with the acting user's id, and
//! invalidates the ward's cached views. The append only succeeds if nobody
//! wrote to the ward since it was loaded; otherwise the command is
//! re-validated against the fresh state.

use thiserror::Error;
use tracing::{info, warn};
use wardstats_cache::CacheService;
use wardstats_cache::region::{DEMOGRAPHIC_STATISTICS, ECONOMIC_STATISTICS, WARD_STATISTICS};
use wardstats_core::aggregate::StatisticalAggregate;
use wardstats_core::command::Command;
use wardstats_core::error::DomainError;
use wardstats_sourcing::{AuditEntry, EventSourcingEngine, SaveEventsError};

use crate::application::computations::{OVERVIEW_KEY, demographic_key, economic_key, stats_key};
use crate::domain::aggregates::WardStatistic;
use crate::domain::commands::{
    AdjustPopulation, RecordEmployment, RecordIncome, RecordWard, ReviseHouseholds,
};

/// Why a command did not complete.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command was rejected or the ward could not be loaded.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Persisting the events failed; the error says how much was persisted.
    #[error(transparent)]
    Durability(#[from] SaveEventsError),
}

/// Removes every cached view derived from `ward_id`.
pub async fn invalidate_ward_views(cache: &CacheService, ward_id: &str) {
    cache.invalidate(&stats_key(ward_id), WARD_STATISTICS).await;
    cache
        .invalidate(&demographic_key(ward_id), DEMOGRAPHIC_STATISTICS)
        .await;
    cache
        .invalidate(&economic_key(ward_id), ECONOMIC_STATISTICS)
        .await;
    cache.invalidate(OVERVIEW_KEY, WARD_STATISTICS).await;
}

/// How many times a command is re-validated after losing an append race.
const MAX_COMMAND_ATTEMPTS: u32 = 3;

async fn execute<C, F>(
    command: &C,
    engine: &EventSourcingEngine,
    cache: &CacheService,
    mutate: F,
) -> Result<Vec<AuditEntry>, CommandError>
where
    C: Command,
    F: Fn(&mut WardStatistic) -> Result<(), DomainError>,
{
    let mut attempt = 1;
    loop {
        let (mut ward, last_sequence) = engine
            .load_for_update(WardStatistic::new(command.entity_id()))
            .await?;
        mutate(&mut ward)?;
        let events = ward.produce_events();

        let result = engine
            .save_events_after(
                ward.entity_id(),
                WardStatistic::entity_type(),
                &events,
                command.actor_id(),
                last_sequence,
            )
            .await;

        match result {
            Err(err)
                if err.persisted.is_empty()
                    && matches!(err.source, DomainError::ConcurrencyConflict { .. })
                    && attempt < MAX_COMMAND_ATTEMPTS =>
            {
                warn!(
                    command = command.command_type(),
                    ward_id = command.entity_id(),
                    attempt,
                    "ward changed while handling command, re-validating"
                );
                attempt += 1;
            }
            result => return finish(command, cache, ward.entity_id(), result).await,
        }
    }
}

async fn finish<C: Command>(
    command: &C,
    cache: &CacheService,
    ward_id: &str,
    result: Result<Vec<AuditEntry>, SaveEventsError>,
) -> Result<Vec<AuditEntry>, CommandError> {
    let persisted_any = match &result {
        Ok(trail) => !trail.is_empty(),
        Err(err) => !err.persisted.is_empty(),
    };
    if persisted_any {
        invalidate_ward_views(cache, ward_id).await;
    }

    let trail = result?;
    info!(
        command = command.command_type(),
        ward_id,
        events = trail.len(),
        "command handled"
    );
    Ok(trail)
}

/// Handles the `RecordWard` command.
///
/// # Errors
///
/// Returns `CommandError::Domain` if validation or loading fails and
/// `CommandError::Durability` if the events could not all be persisted.
pub async fn record_ward(
    command: &RecordWard,
    engine: &EventSourcingEngine,
    cache: &CacheService,
) -> Result<Vec<AuditEntry>, CommandError> {
    execute(command, engine, cache, |ward| {
        ward.record(&command.ward_name, command.population, command.households)
    })
    .await
}

/// Handles the `AdjustPopulation` command.
///
/// # Errors
///
/// Returns `CommandError::Domain` if validation or loading fails and
/// `CommandError::Durability` if the events could not all be persisted.
pub async fn adjust_population(
    command: &AdjustPopulation,
    engine: &EventSourcingEngine,
    cache: &CacheService,
) -> Result<Vec<AuditEntry>, CommandError> {
    execute(command, engine, cache, |ward| {
        ward.adjust_population(command.delta, &command.reason)
    })
    .await
}

/// Handles the `ReviseHouseholds` command.
///
/// # Errors
///
/// Returns `CommandError::Domain` if validation or loading fails and
/// `CommandError::Durability` if the events could not all be persisted.
pub async fn revise_households(
    command: &ReviseHouseholds,
    engine: &EventSourcingEngine,
    cache: &CacheService,
) -> Result<Vec<AuditEntry>, CommandError> {
    execute(command, engine, cache, |ward| {
        ward.revise_households(command.households)
    })
    .await
}

/// Handles the `RecordEmployment` command.
///
/// # Errors
///
/// Returns `CommandError::Domain` if validation or loading fails and
/// `CommandError::Durability` if the events could not all be persisted.
pub async fn record_employment(
    command: &RecordEmployment,
    engine: &EventSourcingEngine,
    cache: &CacheService,
) -> Result<Vec<AuditEntry>, CommandError> {
    execute(command, engine, cache, |ward| {
        ward.record_employment(command.employed, command.unemployed)
    })
    .await
}

/// Handles the `RecordIncome` command.
///
/// # Errors
///
/// Returns `CommandError::Domain` if validation or loading fails and
/// `CommandError::Durability` if the events could not all be persisted.
pub async fn record_income(
    command: &RecordIncome,
    engine: &EventSourcingEngine,
    cache: &CacheService,
) -> Result<Vec<AuditEntry>, CommandError> {
    execute(command, engine, cache, |ward| {
        ward.record_income(command.median_income_cents)
    })
    .await
}
