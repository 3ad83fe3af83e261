//! Region policies: TTL, tier participation, and shared-tier format.
//!
//! Policies are configuration. [`CacheRegions::default`] carries the built-in
//! table; deployments add or override regions from their config file.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Per-ward aggregate views.
pub const WARD_STATISTICS: &str = "ward_statistics";
/// Demographic breakdowns.
pub const DEMOGRAPHIC_STATISTICS: &str = "demographic_statistics";
/// Economic breakdowns.
pub const ECONOMIC_STATISTICS: &str = "economic_statistics";
/// Hot lookup data.
pub const FREQUENTLY_ACCESSED: &str = "frequently_accessed";
/// Reference data.
pub const RARELY_UPDATED: &str = "rarely_updated";
/// Dated historical snapshots, kept well past any job schedule period.
pub const TREND_ARCHIVE: &str = "trend_archive";

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;
const YEAR: u64 = 365 * DAY;

/// Serialization used for a region's shared-tier payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// Compact JSON.
    #[default]
    Json,
    /// YAML, for human-inspected archives.
    Yaml,
}

impl PayloadFormat {
    /// Serializes `value` into bytes.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Encode` if serialization fails.
    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>, CacheError> {
        match self {
            Self::Json => serde_json::to_vec(value).map_err(|e| CacheError::Encode(e.to_string())),
            Self::Yaml => serde_yaml::to_string(value)
                .map(String::into_bytes)
                .map_err(|e| CacheError::Encode(e.to_string())),
        }
    }

    /// Deserializes bytes produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Decode` if the bytes do not hold a `T`.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CacheError> {
        match self {
            Self::Json => serde_json::from_slice(bytes).map_err(|e| CacheError::Decode(e.to_string())),
            Self::Yaml => serde_yaml::from_slice(bytes).map_err(|e| CacheError::Decode(e.to_string())),
        }
    }
}

fn enabled() -> bool {
    true
}

/// Policy for one named region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionPolicy {
    /// TTL applied when `put` is called without one.
    pub ttl_seconds: u64,
    /// Whether the process-local tier participates.
    #[serde(default = "enabled")]
    pub local: bool,
    /// Whether the shared tier participates.
    #[serde(default = "enabled")]
    pub shared: bool,
    /// Shared-tier payload format.
    #[serde(default)]
    pub format: PayloadFormat,
}

impl RegionPolicy {
    /// A policy using both tiers and JSON with the given default TTL.
    #[must_use]
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            local: true,
            shared: true,
            format: PayloadFormat::Json,
        }
    }

    /// Restricts the policy to the given tiers.
    #[must_use]
    pub fn with_tiers(mut self, local: bool, shared: bool) -> Self {
        self.local = local;
        self.shared = shared;
        self
    }

    /// Sets the shared-tier payload format.
    #[must_use]
    pub fn with_format(mut self, format: PayloadFormat) -> Self {
        self.format = format;
        self
    }

    /// Returns the default TTL.
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// The configured region table plus a fallback for unlisted regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRegions {
    regions: HashMap<String, RegionPolicy>,
    fallback: RegionPolicy,
}

impl CacheRegions {
    /// An empty table where every region uses `fallback`.
    #[must_use]
    pub fn with_fallback(fallback: RegionPolicy) -> Self {
        Self {
            regions: HashMap::new(),
            fallback,
        }
    }

    /// Adds or replaces one region.
    #[must_use]
    pub fn with_region(mut self, name: impl Into<String>, policy: RegionPolicy) -> Self {
        self.regions.insert(name.into(), policy);
        self
    }

    /// Adds or replaces every region in `overrides`.
    #[must_use]
    pub fn merge(mut self, overrides: HashMap<String, RegionPolicy>) -> Self {
        self.regions.extend(overrides);
        self
    }

    /// Replaces the fallback policy.
    #[must_use]
    pub fn replace_fallback(mut self, fallback: RegionPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Parses a YAML region table (`region name -> policy`) on top of the
    /// built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Config` when the document is not a valid table.
    pub fn from_yaml(document: &str) -> Result<Self, CacheError> {
        let overrides: HashMap<String, RegionPolicy> =
            serde_yaml::from_str(document).map_err(|e| CacheError::Config(e.to_string()))?;
        Ok(Self::default().merge(overrides))
    }

    /// Returns the policy for `region`, or the fallback when it is unlisted.
    #[must_use]
    pub fn policy(&self, region: &str) -> &RegionPolicy {
        self.regions.get(region).unwrap_or(&self.fallback)
    }

    /// Returns whether `region` is explicitly configured.
    #[must_use]
    pub fn is_configured(&self, region: &str) -> bool {
        self.regions.contains_key(region)
    }

    /// Returns the configured region names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.regions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CacheRegions {
    fn default() -> Self {
        Self::with_fallback(RegionPolicy::new(HOUR))
            .with_region(WARD_STATISTICS, RegionPolicy::new(DAY))
            .with_region(DEMOGRAPHIC_STATISTICS, RegionPolicy::new(DAY))
            .with_region(ECONOMIC_STATISTICS, RegionPolicy::new(DAY))
            .with_region(FREQUENTLY_ACCESSED, RegionPolicy::new(30 * 60))
            .with_region(RARELY_UPDATED, RegionPolicy::new(7 * DAY))
            .with_region(TREND_ARCHIVE, RegionPolicy::new(5 * YEAR))
    }
}
