//! Derived views computed from ward statistics, and the cache keys they are
//! stored under.
//!
//! Every computation here is a pure function of aggregate state, so a view
//! rebuilt from a cutoff replay is as valid as one built from live state.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use wardstats_core::aggregate::StatisticalAggregate;

use crate::domain::aggregates::WardStatistic;

/// Cache key of the cross-ward overview.
pub const OVERVIEW_KEY: &str = "overview:wards";

/// Cache key of a ward's [`WardSummary`].
#[must_use]
pub fn stats_key(ward_id: &str) -> String {
    format!("stats:{ward_id}")
}

/// Cache key of a ward's [`DemographicBreakdown`].
#[must_use]
pub fn demographic_key(ward_id: &str) -> String {
    format!("demographic:{ward_id}")
}

/// Cache key of a ward's [`EconomicBreakdown`].
#[must_use]
pub fn economic_key(ward_id: &str) -> String {
    format!("economic:{ward_id}")
}

/// Cache key of the trend snapshot for `reference_date`.
#[must_use]
pub fn trend_key(reference_date: NaiveDate) -> String {
    format!("trend:{}", reference_date.format("%Y-%m-%d"))
}

/// The first instant of the month containing `now`.
#[must_use]
pub fn month_start(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: i64, whole: i64) -> Option<f64> {
    (whole > 0).then(|| part as f64 / whole as f64)
}

/// Headline figures for one ward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardSummary {
    /// The ward identifier.
    pub ward_id: String,
    /// Display name.
    pub ward_name: String,
    /// Resident count.
    pub population: i64,
    /// Household count.
    pub households: i64,
    /// Residents in work.
    pub employed: i64,
    /// Residents seeking work.
    pub unemployed: i64,
    /// Median household income in cents, once recorded.
    pub median_income_cents: Option<i64>,
    /// Number of events behind these figures.
    pub version: i64,
    /// Timestamp of the latest event.
    pub last_recorded_at: Option<DateTime<Utc>>,
}

impl From<&WardStatistic> for WardSummary {
    fn from(ward: &WardStatistic) -> Self {
        Self {
            ward_id: ward.id.clone(),
            ward_name: ward.ward_name().to_owned(),
            population: ward.population(),
            households: ward.households(),
            employed: ward.employed(),
            unemployed: ward.unemployed(),
            median_income_cents: ward.median_income_cents(),
            version: ward.version(),
            last_recorded_at: ward.last_recorded_at(),
        }
    }
}

/// Population structure of one ward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemographicBreakdown {
    /// The ward identifier.
    pub ward_id: String,
    /// Resident count.
    pub population: i64,
    /// Household count.
    pub households: i64,
    /// Residents per household; absent when there are no households.
    pub average_household_size: Option<f64>,
}

impl From<&WardStatistic> for DemographicBreakdown {
    fn from(ward: &WardStatistic) -> Self {
        Self {
            ward_id: ward.id.clone(),
            population: ward.population(),
            households: ward.households(),
            average_household_size: ratio(ward.population(), ward.households()),
        }
    }
}

/// Labour and income picture of one ward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicBreakdown {
    /// The ward identifier.
    pub ward_id: String,
    /// Residents in work.
    pub employed: i64,
    /// Residents seeking work.
    pub unemployed: i64,
    /// Employed plus unemployed.
    pub labour_force: i64,
    /// Share of the labour force seeking work.
    pub unemployment_rate: Option<f64>,
    /// Share of residents in the labour force.
    pub participation_rate: Option<f64>,
    /// Median household income in cents, once recorded.
    pub median_income_cents: Option<i64>,
}

impl From<&WardStatistic> for EconomicBreakdown {
    fn from(ward: &WardStatistic) -> Self {
        let labour_force = ward.employed() + ward.unemployed();
        Self {
            ward_id: ward.id.clone(),
            employed: ward.employed(),
            unemployed: ward.unemployed(),
            labour_force,
            unemployment_rate: ratio(ward.unemployed(), labour_force),
            participation_rate: ratio(labour_force, ward.population()),
            median_income_cents: ward.median_income_cents(),
        }
    }
}

/// Totals across every ward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WardsOverview {
    /// Number of wards included.
    pub ward_count: usize,
    /// Sum of ward populations.
    pub total_population: i64,
    /// Sum of ward household counts.
    pub total_households: i64,
    /// Sum of employed residents.
    pub total_employed: i64,
    /// Sum of unemployed residents.
    pub total_unemployed: i64,
    /// Unemployment rate over the combined labour force.
    pub unemployment_rate: Option<f64>,
    /// Ward with the most residents.
    pub most_populous_ward: Option<String>,
    /// When the overview was computed.
    pub computed_at: DateTime<Utc>,
}

impl WardsOverview {
    /// Aggregates ward summaries.
    #[must_use]
    pub fn from_summaries(summaries: &[WardSummary], computed_at: DateTime<Utc>) -> Self {
        let total_employed = summaries.iter().map(|s| s.employed).sum::<i64>();
        let total_unemployed = summaries.iter().map(|s| s.unemployed).sum::<i64>();
        Self {
            ward_count: summaries.len(),
            total_population: summaries.iter().map(|s| s.population).sum(),
            total_households: summaries.iter().map(|s| s.households).sum(),
            total_employed,
            total_unemployed,
            unemployment_rate: ratio(total_unemployed, total_employed + total_unemployed),
            most_populous_ward: summaries
                .iter()
                .max_by(|a, b| {
                    a.population
                        .cmp(&b.population)
                        .then_with(|| b.ward_id.cmp(&a.ward_id))
                })
                .map(|s| s.ward_id.clone()),
            computed_at,
        }
    }
}

/// One ward's population then and now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardTrend {
    /// The ward identifier.
    pub ward_id: String,
    /// Population at the reference date; absent if the ward did not exist.
    pub population_then: Option<i64>,
    /// Current population.
    pub population_now: i64,
    /// `population_now - population_then`, treating a missing ward as zero.
    pub change: i64,
}

/// Population movement since a reference date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    /// The reference date the archive is keyed by.
    pub reference_date: NaiveDate,
    /// Events strictly before this instant make up the "then" figures.
    pub cutoff: DateTime<Utc>,
    /// Per-ward movement, ordered by ward id.
    pub wards: Vec<WardTrend>,
    /// Total population at the cutoff.
    pub total_then: i64,
    /// Total population now.
    pub total_now: i64,
}

impl TrendSnapshot {
    /// Pairs each ward's state at `cutoff` with its current state.
    #[must_use]
    pub fn compute(cutoff: DateTime<Utc>, pairs: &[(WardStatistic, WardStatistic)]) -> Self {
        let mut wards: Vec<WardTrend> = pairs
            .iter()
            .map(|(then, now)| {
                let population_then = (then.version() > 0).then(|| then.population());
                WardTrend {
                    ward_id: now.id.clone(),
                    population_then,
                    population_now: now.population(),
                    change: now.population() - population_then.unwrap_or(0),
                }
            })
            .collect();
        wards.sort_by(|a, b| a.ward_id.cmp(&b.ward_id));

        Self {
            reference_date: cutoff.date_naive(),
            cutoff,
            total_then: wards.iter().filter_map(|w| w.population_then).sum(),
            total_now: wards.iter().map(|w| w.population_now).sum(),
            wards,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ward(id: &str, population: i64, households: i64) -> WardStatistic {
        let mut ward = WardStatistic::new(id);
        ward.record("Riverside", population, households).unwrap();
        ward
    }

    #[test]
    fn test_keys_follow_naming_scheme() {
        assert_eq!(stats_key("ward-7"), "stats:ward-7");
        assert_eq!(demographic_key("ward-7"), "demographic:ward-7");
        assert_eq!(economic_key("ward-7"), "economic:ward-7");
        assert_eq!(
            trend_key(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            "trend:2026-01-01"
        );
    }

    #[test]
    fn test_month_start_is_first_instant_of_month() {
        let now = Utc.with_ymd_and_hms(2026, 3, 17, 14, 5, 9).unwrap();

        assert_eq!(
            month_start(now),
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_breakdowns_handle_empty_denominators() {
        let empty = ward("ward-1", 0, 0);

        let demographic = DemographicBreakdown::from(&empty);
        let economic = EconomicBreakdown::from(&empty);

        assert_eq!(demographic.average_household_size, None);
        assert_eq!(economic.unemployment_rate, None);
        assert_eq!(economic.participation_rate, None);
    }

    #[test]
    fn test_breakdowns_compute_rates() {
        let mut w = ward("ward-7", 100, 40);
        w.record_employment(45, 5).unwrap();

        let demographic = DemographicBreakdown::from(&w);
        let economic = EconomicBreakdown::from(&w);

        assert_eq!(demographic.average_household_size, Some(2.5));
        assert_eq!(economic.labour_force, 50);
        assert_eq!(economic.unemployment_rate, Some(0.1));
        assert_eq!(economic.participation_rate, Some(0.5));
    }

    #[test]
    fn test_overview_totals_wards() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let summaries = vec![
            WardSummary::from(&ward("ward-1", 100, 40)),
            WardSummary::from(&ward("ward-2", 250, 90)),
        ];

        let overview = WardsOverview::from_summaries(&summaries, now);

        assert_eq!(overview.ward_count, 2);
        assert_eq!(overview.total_population, 350);
        assert_eq!(overview.total_households, 130);
        assert_eq!(overview.unemployment_rate, None);
        assert_eq!(overview.most_populous_ward.as_deref(), Some("ward-2"));
    }

    #[test]
    fn test_trend_treats_new_wards_as_growth_from_zero() {
        let cutoff = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut then = WardStatistic::new("ward-7");
        then.version = 1;
        then.population = 100;
        let pairs = vec![
            (then, ward("ward-7", 105, 40)),
            (WardStatistic::new("ward-8"), ward("ward-8", 30, 10)),
        ];

        let trend = TrendSnapshot::compute(cutoff, &pairs);

        assert_eq!(trend.reference_date, cutoff.date_naive());
        assert_eq!(trend.wards[0].population_then, Some(100));
        assert_eq!(trend.wards[0].change, 5);
        assert_eq!(trend.wards[1].population_then, None);
        assert_eq!(trend.wards[1].change, 30);
        assert_eq!(trend.total_then, 100);
        assert_eq!(trend.total_now, 135);
    }
}
