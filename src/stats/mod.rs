// src/stats/mod.rs

//! Historical invocation statistics.
//!
//! The estimator only talks to a [`StatisticsStore`]; where the data lives is
//! up to the implementation. [`LogStatisticsStore`] keeps everything in memory
//! and is fed with reconstructed event logs.

pub mod log_store;

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::errors::{Result, SchedError};
use crate::logs::{self, LogRecord};
use crate::types::{HostId, TaskTypeId, Timestamp};

pub use log_store::LogStatisticsStore;

/// One finished invocation as seen by the estimator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationStat {
    pub host: HostId,
    pub task_type: TaskTypeId,
    pub timestamp: Timestamp,
    pub real_time_ms: u64,
}

/// Narrow interface to a statistics backend.
pub trait StatisticsStore: Send + Sync + Debug {
    /// All hosts the store has seen invocations on.
    fn host_names(&self) -> Result<BTreeSet<HostId>>;

    /// Task types that occurred in runs of `workflow`.
    fn task_type_ids(&self, workflow: &str) -> Result<BTreeSet<TaskTypeId>>;

    /// Statistics for `task_type` on `host` with a timestamp strictly greater
    /// than `since`, ordered by timestamp.
    fn statistics_since(
        &self,
        task_type: TaskTypeId,
        host: &str,
        since: Timestamp,
    ) -> Result<Vec<InvocationStat>>;

    /// Add one raw log record.
    fn append(&self, record: &LogRecord) -> Result<()>;

    /// Add every record of one run, or none of them.
    ///
    /// The default appends one by one and is only all-or-nothing if
    /// `append` never fails halfway; stores that can do better override it.
    fn append_run(&self, records: &[LogRecord]) -> Result<()> {
        records.iter().try_for_each(|record| self.append(record))
    }
}

/// Outcome of seeding a store from log files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub runs_loaded: usize,
    pub records_appended: usize,
    /// Logs whose reconstruction failed and were left out entirely.
    pub runs_discarded: Vec<PathBuf>,
}

/// Reconstruct each log and append its cleaned records to `store`.
///
/// A log that cannot be reconstructed, or whose records the store rejects as
/// malformed, is discarded as a whole; IO and store failures abort seeding.
pub fn seed_from_logs(store: &dyn StatisticsStore, paths: &[PathBuf]) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for path in paths {
        info!(log = %path.display(), "parsing statistics log");
        let recon = match logs::reconstruct_file(path) {
            Ok(recon) => recon,
            Err(e @ (SchedError::MalformedRecord(_) | SchedError::ReconciliationMismatch(_))) => {
                warn!(log = %path.display(), error = %e, "discarding run statistics");
                summary.runs_discarded.push(path.clone());
                continue;
            }
            Err(e) => return Err(e),
        };

        match store.append_run(&recon.records) {
            Ok(()) => {}
            Err(e @ SchedError::MalformedRecord(_)) => {
                warn!(log = %path.display(), error = %e, "store rejected run; discarding");
                summary.runs_discarded.push(path.clone());
                continue;
            }
            Err(e) => return Err(e),
        }
        summary.runs_loaded += 1;
        summary.records_appended += recon.records.len();
    }

    Ok(summary)
}
