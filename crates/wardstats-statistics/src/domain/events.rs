//! Domain events for the ward statistics context.

use serde::{Deserialize, Serialize};
use wardstats_core::event::DomainEvent;
use wardstats_core::registry::EventRegistry;

/// Tag for [`WardCreated`].
pub const WARD_CREATED: &str = "ward_statistic.created";
/// Tag for [`PopulationAdjusted`].
pub const POPULATION_ADJUSTED: &str = "ward_statistic.population_adjusted";
/// Tag for [`HouseholdsRevised`].
pub const HOUSEHOLDS_REVISED: &str = "ward_statistic.households_revised";
/// Tag for [`EmploymentRecorded`].
pub const EMPLOYMENT_RECORDED: &str = "ward_statistic.employment_recorded";
/// Tag for [`IncomeRecorded`].
pub const INCOME_RECORDED: &str = "ward_statistic.income_recorded";

/// Emitted when a ward is first recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardCreated {
    /// Display name of the ward.
    pub ward_name: String,
    /// Initial resident count.
    pub population: i64,
    /// Initial household count.
    pub households: i64,
}

/// Emitted when the resident count changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationAdjusted {
    /// Signed change in residents.
    pub delta: i64,
    /// Why the count changed (births, migration, census correction, ...).
    pub reason: String,
}

/// Emitted when the household count is revised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdsRevised {
    /// New household count.
    pub households: i64,
}

/// Emitted when a labour survey is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmploymentRecorded {
    /// Residents in work.
    pub employed: i64,
    /// Residents seeking work.
    pub unemployed: i64,
}

/// Emitted when an income survey is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeRecorded {
    /// Median household income, in cents.
    pub median_income_cents: i64,
}

/// Every event a ward statistic produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WardStatisticEvent {
    /// The ward was recorded.
    Created(WardCreated),
    /// The population changed.
    PopulationAdjusted(PopulationAdjusted),
    /// The household count was revised.
    HouseholdsRevised(HouseholdsRevised),
    /// Employment figures were recorded.
    EmploymentRecorded(EmploymentRecorded),
    /// Median income was recorded.
    IncomeRecorded(IncomeRecorded),
}

impl DomainEvent for WardStatisticEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => WARD_CREATED,
            Self::PopulationAdjusted(_) => POPULATION_ADJUSTED,
            Self::HouseholdsRevised(_) => HOUSEHOLDS_REVISED,
            Self::EmploymentRecorded(_) => EMPLOYMENT_RECORDED,
            Self::IncomeRecorded(_) => INCOME_RECORDED,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Created(payload) => serde_json::to_value(payload),
            Self::PopulationAdjusted(payload) => serde_json::to_value(payload),
            Self::HouseholdsRevised(payload) => serde_json::to_value(payload),
            Self::EmploymentRecorded(payload) => serde_json::to_value(payload),
            Self::IncomeRecorded(payload) => serde_json::to_value(payload),
        }
    }
}

/// Builds the decoder table for every ward statistic event tag.
#[must_use]
pub fn registry() -> EventRegistry<WardStatisticEvent> {
    EventRegistry::new()
        .register(WARD_CREATED, |v| {
            serde_json::from_value(v).map(WardStatisticEvent::Created)
        })
        .register(POPULATION_ADJUSTED, |v| {
            serde_json::from_value(v).map(WardStatisticEvent::PopulationAdjusted)
        })
        .register(HOUSEHOLDS_REVISED, |v| {
            serde_json::from_value(v).map(WardStatisticEvent::HouseholdsRevised)
        })
        .register(EMPLOYMENT_RECORDED, |v| {
            serde_json::from_value(v).map(WardStatisticEvent::EmploymentRecorded)
        })
        .register(INCOME_RECORDED, |v| {
            serde_json::from_value(v).map(WardStatisticEvent::IncomeRecorded)
        })
}
