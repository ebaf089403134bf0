// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{PolicyKind, StatisticsBackend};

pub const DEFAULT_RESYNC_INTERVAL_MS: u64 = 30_000;

/// Configuration exactly as deserialised from TOML.
///
/// ```toml
/// [scheduler]
/// retry_budget = 3
/// policy = "estimate-aware"
///
/// [statistics]
/// backend = "log"
/// logs = ["runs/montage-1.log", "runs/montage-2.log"]
///
/// [estimator]
/// workflow = "montage"
/// resync_interval_ms = 30000
/// ```
///
/// Nothing here has been checked yet; convert to [`ConfigFile`] with
/// `ConfigFile::try_from`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    pub scheduler: RawSchedulerSection,

    #[serde(default)]
    pub statistics: StatisticsSection,

    pub estimator: RawEstimatorSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSchedulerSection {
    /// Maximum attempts per task. Left optional here so a missing value can
    /// be reported as a config error instead of a parse error.
    #[serde(default)]
    pub retry_budget: Option<u32>,

    #[serde(default)]
    pub policy: PolicyKind,
}

/// `[statistics]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatisticsSection {
    #[serde(default)]
    pub backend: StatisticsBackend,

    /// Event logs used to seed the store. Relative paths are resolved
    /// against the config file's directory by the loader.
    #[serde(default)]
    pub logs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEstimatorSection {
    pub workflow: String,

    #[serde(default = "default_resync_interval_ms")]
    pub resync_interval_ms: u64,
}

fn default_resync_interval_ms() -> u64 {
    DEFAULT_RESYNC_INTERVAL_MS
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scheduler: SchedulerSection,
    pub statistics: StatisticsSection,
    pub estimator: EstimatorSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSection {
    pub retry_budget: u32,
    pub policy: PolicyKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatorSection {
    pub workflow: String,
    pub resync_interval: Duration,
}

impl ConfigFile {
    /// Build a config without validation. Only `TryFrom<RawConfigFile>` and
    /// tests should call this.
    pub fn new_unchecked(
        scheduler: SchedulerSection,
        statistics: StatisticsSection,
        estimator: EstimatorSection,
    ) -> Self {
        Self {
            scheduler,
            statistics,
            estimator,
        }
    }
}
