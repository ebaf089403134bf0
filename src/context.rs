// src/context.rs

//! Explicitly constructed scheduler context.
//!
//! Owns the configuration, the statistics store handle and the runtime
//! estimator. Everything that needs one of them gets it from here; there are
//! no process-wide singletons.

use std::sync::Arc;

use tracing::info;

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::estimate::{ResyncSummary, RuntimeEstimator};
use crate::sched::{Scheduler, policy_for};
use crate::stats::{self, LogStatisticsStore, SeedSummary, StatisticsStore};
use crate::types::StatisticsBackend;

#[derive(Debug, Clone)]
pub struct SchedulerContext {
    config: ConfigFile,
    store: Arc<dyn StatisticsStore>,
    estimator: Arc<RuntimeEstimator>,
}

impl SchedulerContext {
    /// Context backed by an in-memory [`LogStatisticsStore`].
    pub fn from_config(config: ConfigFile) -> Self {
        Self::with_store(config, Arc::new(LogStatisticsStore::new()))
    }

    /// Context backed by a caller-supplied store.
    pub fn with_store(config: ConfigFile, store: Arc<dyn StatisticsStore>) -> Self {
        let estimator = Arc::new(RuntimeEstimator::new(
            Arc::clone(&store),
            config.estimator.workflow.clone(),
        ));
        Self {
            config,
            store,
            estimator,
        }
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn StatisticsStore> {
        &self.store
    }

    pub fn estimator(&self) -> &Arc<RuntimeEstimator> {
        &self.estimator
    }

    /// Seed the store from the configured logs (log backend only), then run
    /// the first resync.
    pub fn initialize(&self) -> Result<(SeedSummary, ResyncSummary)> {
        let seeded = match self.config.statistics.backend {
            StatisticsBackend::Log => {
                let summary = stats::seed_from_logs(self.store.as_ref(), &self.config.statistics.logs)?;
                info!(
                    runs_loaded = summary.runs_loaded,
                    runs_discarded = summary.runs_discarded.len(),
                    records = summary.records_appended,
                    "statistics store seeded"
                );
                summary
            }
            StatisticsBackend::Memory => SeedSummary::default(),
        };

        let resynced = self.estimator.resync()?;
        Ok((seeded, resynced))
    }

    /// A scheduler configured from `[scheduler]`, reading estimates from this
    /// context's estimator.
    pub fn build_scheduler(&self) -> Scheduler {
        let policy = policy_for(self.config.scheduler.policy);
        Scheduler::new(policy, self.config.scheduler.retry_budget)
            .with_estimator(Arc::clone(&self.estimator))
    }
}
