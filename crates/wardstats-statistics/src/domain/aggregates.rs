//! Aggregate root for the ward statistics context.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use wardstats_core::aggregate::StatisticalAggregate;
use wardstats_core::error::DomainError;
use wardstats_core::event::Recorded;
use wardstats_core::registry::EventRegistry;

use super::events::{
    EmploymentRecorded, HouseholdsRevised, IncomeRecorded, PopulationAdjusted, WardCreated,
    WardStatisticEvent, registry,
};

/// Aggregate type name stored with every ward statistic event.
pub const WARD_STATISTIC: &str = "ward_statistic";

/// Demographic and economic figures for one ward.
///
/// Mutations validate against the current figures, update them, and queue
/// the matching event. Replay applies the same transition through
/// [`StatisticalAggregate::evolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WardStatistic {
    /// Aggregate identifier, e.g. `ward-7`.
    pub id: String,
    pub(crate) ward_name: String,
    pub(crate) population: i64,
    pub(crate) households: i64,
    pub(crate) employed: i64,
    pub(crate) unemployed: i64,
    pub(crate) median_income_cents: Option<i64>,
    pub(crate) last_recorded_at: Option<DateTime<Utc>>,
    pub(crate) version: i64,
    uncommitted_events: Vec<WardStatisticEvent>,
}

impl WardStatistic {
    /// Creates a blank ward with no history.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ward_name: String::new(),
            population: 0,
            households: 0,
            employed: 0,
            unemployed: 0,
            median_income_cents: None,
            last_recorded_at: None,
            version: 0,
            uncommitted_events: Vec::new(),
        }
    }

    /// Returns whether the ward has been recorded, in history or in a pending
    /// change.
    #[must_use]
    pub fn exists(&self) -> bool {
        !self.ward_name.is_empty()
    }

    /// Display name.
    #[must_use]
    pub fn ward_name(&self) -> &str {
        &self.ward_name
    }

    /// Resident count.
    #[must_use]
    pub fn population(&self) -> i64 {
        self.population
    }

    /// Household count.
    #[must_use]
    pub fn households(&self) -> i64 {
        self.households
    }

    /// Residents in work.
    #[must_use]
    pub fn employed(&self) -> i64 {
        self.employed
    }

    /// Residents seeking work.
    #[must_use]
    pub fn unemployed(&self) -> i64 {
        self.unemployed
    }

    /// Median household income in cents, once recorded.
    #[must_use]
    pub fn median_income_cents(&self) -> Option<i64> {
        self.median_income_cents
    }

    /// Timestamp of the latest applied event.
    #[must_use]
    pub fn last_recorded_at(&self) -> Option<DateTime<Utc>> {
        self.last_recorded_at
    }

    /// Records a new ward.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the ward already exists, the name
    /// is blank, or a figure is negative.
    pub fn record(
        &mut self,
        ward_name: &str,
        population: i64,
        households: i64,
    ) -> Result<(), DomainError> {
        if self.exists() {
            return Err(DomainError::Validation(format!(
                "ward {} is already recorded",
                self.id
            )));
        }
        let ward_name = ward_name.trim();
        if ward_name.is_empty() {
            return Err(DomainError::Validation("ward name must not be empty".into()));
        }
        non_negative("population", population)?;
        non_negative("households", households)?;

        self.raise(WardStatisticEvent::Created(WardCreated {
            ward_name: ward_name.to_owned(),
            population,
            households,
        }));
        Ok(())
    }

    /// Changes the population by `delta`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the ward does not exist, the
    /// delta is zero, or the population would go negative.
    pub fn adjust_population(&mut self, delta: i64, reason: &str) -> Result<(), DomainError> {
        self.require_exists()?;
        if delta == 0 {
            return Err(DomainError::Validation(
                "population adjustment must be non-zero".into(),
            ));
        }
        let resulting = self.population.checked_add(delta).ok_or_else(|| {
            DomainError::Validation("population adjustment overflows".into())
        })?;
        non_negative("resulting population", resulting)?;

        self.raise(WardStatisticEvent::PopulationAdjusted(PopulationAdjusted {
            delta,
            reason: reason.trim().to_owned(),
        }));
        Ok(())
    }

    /// Replaces the household count.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the ward does not exist or the
    /// count is negative.
    pub fn revise_households(&mut self, households: i64) -> Result<(), DomainError> {
        self.require_exists()?;
        non_negative("households", households)?;

        self.raise(WardStatisticEvent::HouseholdsRevised(HouseholdsRevised {
            households,
        }));
        Ok(())
    }

    /// Replaces the employment figures.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the ward does not exist, a figure
    /// is negative, or the labour force exceeds the population.
    pub fn record_employment(&mut self, employed: i64, unemployed: i64) -> Result<(), DomainError> {
        self.require_exists()?;
        non_negative("employed", employed)?;
        non_negative("unemployed", unemployed)?;
        let labour_force = employed.saturating_add(unemployed);
        if labour_force > self.population {
            return Err(DomainError::Validation(format!(
                "labour force {labour_force} exceeds population {}",
                self.population
            )));
        }

        self.raise(WardStatisticEvent::EmploymentRecorded(EmploymentRecorded {
            employed,
            unemployed,
        }));
        Ok(())
    }

    /// Replaces the median household income.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the ward does not exist or the
    /// income is negative.
    pub fn record_income(&mut self, median_income_cents: i64) -> Result<(), DomainError> {
        self.require_exists()?;
        non_negative("median income", median_income_cents)?;

        self.raise(WardStatisticEvent::IncomeRecorded(IncomeRecorded {
            median_income_cents,
        }));
        Ok(())
    }

    fn require_exists(&self) -> Result<(), DomainError> {
        if self.exists() {
            Ok(())
        } else {
            Err(DomainError::AggregateNotFound(self.id.clone()))
        }
    }

    fn raise(&mut self, event: WardStatisticEvent) {
        self.change(&event);
        self.uncommitted_events.push(event);
    }

    /// The state transition shared by mutations and replay.
    fn change(&mut self, event: &WardStatisticEvent) {
        match event {
            WardStatisticEvent::Created(e) => {
                self.ward_name.clone_from(&e.ward_name);
                self.population = e.population;
                self.households = e.households;
            }
            WardStatisticEvent::PopulationAdjusted(e) => {
                self.population = self.population.saturating_add(e.delta);
            }
            WardStatisticEvent::HouseholdsRevised(e) => self.households = e.households,
            WardStatisticEvent::EmploymentRecorded(e) => {
                self.employed = e.employed;
                self.unemployed = e.unemployed;
            }
            WardStatisticEvent::IncomeRecorded(e) => {
                self.median_income_cents = Some(e.median_income_cents);
            }
        }
    }
}

fn non_negative(field: &str, value: i64) -> Result<(), DomainError> {
    if value < 0 {
        return Err(DomainError::Validation(format!(
            "{field} must not be negative, got {value}"
        )));
    }
    Ok(())
}

impl StatisticalAggregate for WardStatistic {
    type Event = WardStatisticEvent;

    fn entity_type() -> &'static str {
        WARD_STATISTIC
    }

    fn event_registry() -> &'static EventRegistry<WardStatisticEvent> {
        static REGISTRY: OnceLock<EventRegistry<WardStatisticEvent>> = OnceLock::new();
        REGISTRY.get_or_init(registry)
    }

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn evolve(mut self, event: &Recorded<WardStatisticEvent>) -> Self {
        self.change(&event.event);
        self.last_recorded_at = Some(event.occurred_at());
        self.version += 1;
        self
    }

    fn uncommitted_events(&self) -> &[WardStatisticEvent] {
        &self.uncommitted_events
    }

    fn produce_events(&mut self) -> Vec<WardStatisticEvent> {
        std::mem::take(&mut self.uncommitted_events)
    }
}
