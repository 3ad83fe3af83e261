//! Commands for the ward statistics context.

use wardstats_core::command::Command;

/// Command to record a new ward.
#[derive(Debug, Clone)]
pub struct RecordWard {
    /// The ward identifier.
    pub ward_id: String,
    /// Display name.
    pub ward_name: String,
    /// Initial resident count.
    pub population: i64,
    /// Initial household count.
    pub households: i64,
    /// The acting user.
    pub actor_id: Option<String>,
}

/// Command to change a ward's population.
#[derive(Debug, Clone)]
pub struct AdjustPopulation {
    /// The ward identifier.
    pub ward_id: String,
    /// Signed change in residents.
    pub delta: i64,
    /// Why the count changed.
    pub reason: String,
    /// The acting user.
    pub actor_id: Option<String>,
}

/// Command to replace a ward's household count.
#[derive(Debug, Clone)]
pub struct ReviseHouseholds {
    /// The ward identifier.
    pub ward_id: String,
    /// New household count.
    pub households: i64,
    /// The acting user.
    pub actor_id: Option<String>,
}

/// Command to record a ward's employment survey.
#[derive(Debug, Clone)]
pub struct RecordEmployment {
    /// The ward identifier.
    pub ward_id: String,
    /// Residents in work.
    pub employed: i64,
    /// Residents seeking work.
    pub unemployed: i64,
    /// The acting user.
    pub actor_id: Option<String>,
}

/// Command to record a ward's median income.
#[derive(Debug, Clone)]
pub struct RecordIncome {
    /// The ward identifier.
    pub ward_id: String,
    /// Median household income, in cents.
    pub median_income_cents: i64,
    /// The acting user.
    pub actor_id: Option<String>,
}

macro_rules! impl_command {
    ($command:ty, $tag:literal) => {
        impl Command for $command {
            fn command_type(&self) -> &'static str {
                $tag
            }

            fn entity_id(&self) -> &str {
                &self.ward_id
            }

            fn actor_id(&self) -> Option<&str> {
                self.actor_id.as_deref()
            }
        }
    };
}

impl_command!(RecordWard, "ward_statistic.record_ward");
impl_command!(AdjustPopulation, "ward_statistic.adjust_population");
impl_command!(ReviseHouseholds, "ward_statistic.revise_households");
impl_command!(RecordEmployment, "ward_statistic.record_employment");
impl_command!(RecordIncome, "ward_statistic.record_income");
