// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{
    ConfigFile, EstimatorSection, RawConfigFile, SchedulerSection, StatisticsSection,
};
use crate::errors::{Result, SchedError};
use crate::types::StatisticsBackend;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SchedError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let retry_budget = validate_retry_budget(raw.scheduler.retry_budget)?;
        validate_statistics(&raw.statistics)?;
        validate_estimator(&raw)?;

        Ok(ConfigFile::new_unchecked(
            SchedulerSection {
                retry_budget,
                policy: raw.scheduler.policy,
            },
            raw.statistics,
            EstimatorSection {
                workflow: raw.estimator.workflow.trim().to_string(),
                resync_interval: Duration::from_millis(raw.estimator.resync_interval_ms),
            },
        ))
    }
}

fn validate_retry_budget(budget: Option<u32>) -> Result<u32> {
    match budget {
        None => Err(SchedError::ConfigError(
            "[scheduler].retry_budget is required (maximum attempts per task, >= 1)".to_string(),
        )),
        Some(0) => Err(SchedError::ConfigError(
            "[scheduler].retry_budget must be >= 1 (got 0)".to_string(),
        )),
        Some(n) => Ok(n),
    }
}

fn validate_statistics(stats: &StatisticsSection) -> Result<()> {
    if stats.backend == StatisticsBackend::Memory && !stats.logs.is_empty() {
        return Err(SchedError::ConfigError(
            "[statistics].logs is only allowed with backend = \"log\"".to_string(),
        ));
    }
    Ok(())
}

fn validate_estimator(raw: &RawConfigFile) -> Result<()> {
    if raw.estimator.workflow.trim().is_empty() {
        return Err(SchedError::ConfigError(
            "[estimator].workflow must not be empty".to_string(),
        ));
    }
    if raw.estimator.resync_interval_ms == 0 {
        return Err(SchedError::ConfigError(
            "[estimator].resync_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
