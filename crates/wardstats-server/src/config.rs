//! Process configuration: environment variables plus an optional YAML file.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Deserialize;
use wardstats_cache::service::DEFAULT_SHARED_TIMEOUT;
use wardstats_cache::{CacheRegions, RegionPolicy};
use wardstats_statistics::application::jobs::{CACHE_CLEANUP, PRECOMPUTE_STATISTICS, TREND_REPORT};

use crate::error::AppError;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_TICK_SECS: u64 = 1;

/// Cron schedule and time budget for one job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSchedule {
    /// Six-field cron expression (seconds first).
    pub cron: String,
    /// Runs longer than this are abandoned.
    pub max_duration_secs: u64,
}

impl JobSchedule {
    fn new(cron: &str, max_duration_secs: u64) -> Self {
        Self {
            cron: cron.to_owned(),
            max_duration_secs,
        }
    }

    /// Returns the duration budget.
    #[must_use]
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

/// Shape of the optional YAML file named by `WARDSTATS_CONFIG`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Region policies layered over the built-in table.
    pub regions: HashMap<String, RegionPolicy>,
    /// Policy for regions that are not listed.
    pub fallback_region: Option<RegionPolicy>,
    /// Per-job schedule overrides.
    pub jobs: HashMap<String, JobSchedule>,
}

impl FileConfig {
    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the document does not match the
    /// expected shape.
    pub fn from_yaml(document: &str) -> Result<Self, AppError> {
        serde_yaml::from_str(document)
            .map_err(|e| AppError::Config(format!("invalid config file: {e}")))
    }
}

/// Scheduler settings: pool size, tick cadence, and job schedules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of jobs running at once.
    pub workers: usize,
    /// How often the tick loop checks for due jobs.
    pub tick_interval: Duration,
    /// Schedule per job name.
    pub jobs: BTreeMap<String, JobSchedule>,
}

impl SchedulerConfig {
    /// Returns the schedule for `job`, if any.
    #[must_use]
    pub fn job(&self, job: &str) -> Option<&JobSchedule> {
        self.jobs.get(job)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let jobs = BTreeMap::from([
            (
                PRECOMPUTE_STATISTICS.to_owned(),
                JobSchedule::new("0 0 2 * * *", 30 * 60),
            ),
            (CACHE_CLEANUP.to_owned(), JobSchedule::new("0 0 * * * *", 5 * 60)),
            (TREND_REPORT.to_owned(), JobSchedule::new("0 0 3 1 * *", 30 * 60)),
        ]);
        Self {
            workers: DEFAULT_WORKERS,
            tick_interval: Duration::from_secs(DEFAULT_TICK_SECS),
            jobs,
        }
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Cache region table.
    pub regions: CacheRegions,
    /// Budget for each call to the shared cache tier.
    pub shared_cache_timeout: Duration,
    /// Job runner settings.
    pub scheduler: SchedulerConfig,
}

impl ServerConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when a required variable is missing, a
    /// value does not parse, or the config file cannot be read.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, reading the YAML file it names.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let file = match lookup("WARDSTATS_CONFIG") {
            Some(path) => {
                let document = std::fs::read_to_string(&path)
                    .map_err(|e| AppError::Config(format!("cannot read {path}: {e}")))?;
                FileConfig::from_yaml(&document)?
            }
            None => FileConfig::default(),
        };
        Self::resolve(lookup, file)
    }

    /// Combines environment values with an already-parsed file.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
        file: FileConfig,
    ) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| AppError::Config("DATABASE_URL must be set".to_owned()))?;
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let workers = parse_or(&lookup, "SCHEDULER_WORKERS", DEFAULT_WORKERS)?;
        if workers == 0 {
            return Err(AppError::Config(
                "SCHEDULER_WORKERS must be at least 1".to_owned(),
            ));
        }
        let tick_secs = parse_or(&lookup, "SCHEDULER_TICK_SECS", DEFAULT_TICK_SECS)?;
        let shared_timeout_ms = parse_or(
            &lookup,
            "CACHE_SHARED_TIMEOUT_MS",
            u64::try_from(DEFAULT_SHARED_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
        )?;
        if shared_timeout_ms == 0 {
            return Err(AppError::Config(
                "CACHE_SHARED_TIMEOUT_MS must be at least 1".to_owned(),
            ));
        }

        let mut regions = CacheRegions::default().merge(file.regions);
        if let Some(fallback) = file.fallback_region {
            regions = regions.replace_fallback(fallback);
        }

        let mut scheduler = SchedulerConfig {
            workers,
            tick_interval: Duration::from_secs(tick_secs.max(1)),
            ..SchedulerConfig::default()
        };
        scheduler.jobs.extend(file.jobs);

        Ok(Self {
            database_url,
            host,
            port,
            regions,
            shared_cache_timeout: Duration::from_millis(shared_timeout_ms),
            scheduler,
        })
    }

    /// Returns the `host:port` bind address.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, AppError> {
    match lookup(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wardstats_cache::region::{FREQUENTLY_ACCESSED, WARD_STATISTICS};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        // Act
        let config =
            ServerConfig::resolve(env(&[("DATABASE_URL", "postgres://localhost/wards")]), FileConfig::default())
                .unwrap();

        // Assert
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.scheduler.workers, 4);
        assert_eq!(config.scheduler.tick_interval, Duration::from_secs(1));
        assert_eq!(config.scheduler.job(CACHE_CLEANUP).unwrap().cron, "0 0 * * * *");
        assert_eq!(config.regions.policy(WARD_STATISTICS).ttl_seconds, 86_400);
        assert_eq!(config.shared_cache_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_shared_cache_timeout_is_read_in_milliseconds() {
        let config = ServerConfig::resolve(
            env(&[("DATABASE_URL", "postgres://x"), ("CACHE_SHARED_TIMEOUT_MS", "1500")]),
            FileConfig::default(),
        )
        .unwrap();

        assert_eq!(config.shared_cache_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_zero_shared_cache_timeout_is_rejected() {
        let result = ServerConfig::resolve(
            env(&[("DATABASE_URL", "postgres://x"), ("CACHE_SHARED_TIMEOUT_MS", "0")]),
            FileConfig::default(),
        );

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("CACHE_SHARED_TIMEOUT_MS")));
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        let result = ServerConfig::resolve(env(&[]), FileConfig::default());

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("DATABASE_URL")));
    }

    #[test]
    fn test_unparseable_port_is_rejected() {
        let result = ServerConfig::resolve(
            env(&[("DATABASE_URL", "postgres://x"), ("PORT", "eighty")]),
            FileConfig::default(),
        );

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("PORT")));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let result = ServerConfig::resolve(
            env(&[("DATABASE_URL", "postgres://x"), ("SCHEDULER_WORKERS", "0")]),
            FileConfig::default(),
        );

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_file_overrides_regions_fallback_and_jobs() {
        // Arrange
        let file = FileConfig::from_yaml(
            r#"
regions:
  frequently_accessed:
    ttl_seconds: 60
    shared: false
fallback_region:
  ttl_seconds: 900
jobs:
  cache_cleanup:
    cron: "0 */5 * * * *"
    max_duration_secs: 30
"#,
        )
        .unwrap();

        // Act
        let config = ServerConfig::resolve(env(&[("DATABASE_URL", "postgres://x")]), file).unwrap();

        // Assert
        let frequent = config.regions.policy(FREQUENTLY_ACCESSED);
        assert_eq!(frequent.ttl_seconds, 60);
        assert!(frequent.local);
        assert!(!frequent.shared);
        assert_eq!(config.regions.policy("unlisted").ttl_seconds, 900);
        let cleanup = config.scheduler.job(CACHE_CLEANUP).unwrap();
        assert_eq!(cleanup.cron, "0 */5 * * * *");
        assert_eq!(cleanup.max_duration(), Duration::from_secs(30));
        assert_eq!(
            config.scheduler.job(PRECOMPUTE_STATISTICS).unwrap().cron,
            "0 0 2 * * *"
        );
    }

    #[test]
    fn test_unknown_file_keys_are_rejected() {
        let result = FileConfig::from_yaml("regoins: {}\n");

        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
