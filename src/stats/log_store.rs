// src/stats/log_store.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::errors::{Result, SchedError};
use crate::logs::{LogRecord, RecordKey};
use crate::stats::{InvocationStat, StatisticsStore};
use crate::types::{HostId, InvocationId, TaskTypeId, Timestamp};

/// A timed invocation whose host is not known yet.
#[derive(Debug, Clone)]
struct PendingTime {
    task_type: TaskTypeId,
    timestamp: Timestamp,
    real_time_ms: u64,
}

/// Invocation ids are only unique within one run.
type InvocationKey = (Option<String>, InvocationId);

#[derive(Debug, Default)]
struct LogStoreState {
    workflow_by_run: HashMap<String, String>,
    task_types_by_run: HashMap<String, BTreeSet<TaskTypeId>>,
    host_by_invocation: HashMap<InvocationKey, HostId>,
    pending: HashMap<InvocationKey, PendingTime>,
    /// Per (task type, host), ordered by timestamp.
    stats: BTreeMap<(TaskTypeId, HostId), Vec<InvocationStat>>,
}

impl LogStoreState {
    fn insert_stat(&mut self, stat: InvocationStat) {
        let series = self
            .stats
            .entry((stat.task_type, stat.host.clone()))
            .or_default();
        let pos = series.partition_point(|s| s.timestamp <= stat.timestamp);
        series.insert(pos, stat);
    }

    /// Apply an already decoded record. Cannot fail.
    fn apply(&mut self, update: StoreUpdate) {
        if let Some((run_id, task_type)) = update.task_type {
            self.task_types_by_run
                .entry(run_id)
                .or_default()
                .insert(task_type);
        }

        match update.change {
            StoreChange::None => {}
            StoreChange::Workflow { run_id, name } => {
                self.workflow_by_run.insert(run_id, name);
            }
            StoreChange::Host { key, host } => {
                self.host_by_invocation.insert(key.clone(), host.clone());
                if let Some(pending) = self.pending.remove(&key) {
                    self.insert_stat(InvocationStat {
                        host,
                        task_type: pending.task_type,
                        timestamp: pending.timestamp,
                        real_time_ms: pending.real_time_ms,
                    });
                }
            }
            StoreChange::Time { key, time } => match self.host_by_invocation.get(&key).cloned() {
                Some(host) => self.insert_stat(InvocationStat {
                    host,
                    task_type: time.task_type,
                    timestamp: time.timestamp,
                    real_time_ms: time.real_time_ms,
                }),
                None => {
                    debug!(invocation = key.1, "timed invocation waiting for its host record");
                    self.pending.insert(key, time);
                }
            },
        }
    }
}

/// What one record changes, checked before any state is touched.
#[derive(Debug)]
struct StoreUpdate {
    task_type: Option<(String, TaskTypeId)>,
    change: StoreChange,
}

#[derive(Debug)]
enum StoreChange {
    None,
    Workflow { run_id: String, name: String },
    Host { key: InvocationKey, host: HostId },
    Time { key: InvocationKey, time: PendingTime },
}

fn decode(record: &LogRecord) -> Result<StoreUpdate> {
    let task_type = match (&record.run_id, record.linkage.task_type_id) {
        (Some(run_id), Some(task_type)) => Some((run_id.clone(), task_type)),
        _ => None,
    };

    let change = match record.key {
        RecordKey::WorkflowName => StoreChange::Workflow {
            run_id: record.run_id.clone().ok_or_else(|| missing(record, "run id"))?,
            name: record.value.raw_str()?,
        },
        RecordKey::InvocHost => {
            let invocation = record
                .linkage
                .invocation_id
                .ok_or_else(|| missing(record, "invocation id"))?;
            StoreChange::Host {
                key: (record.run_id.clone(), invocation),
                host: record.value.raw_str()?,
            }
        }
        RecordKey::InvocTime => {
            let invocation = record
                .linkage
                .invocation_id
                .ok_or_else(|| missing(record, "invocation id"))?;
            let task_type = record
                .linkage
                .task_type_id
                .ok_or_else(|| missing(record, "task type id"))?;
            StoreChange::Time {
                key: (record.run_id.clone(), invocation),
                time: PendingTime {
                    task_type,
                    timestamp: record.timestamp,
                    real_time_ms: record.value.real_time()?,
                },
            }
        }
        _ => StoreChange::None,
    };

    Ok(StoreUpdate { task_type, change })
}

/// In-memory statistics store built from log records.
///
/// Joins `invoc-time` records with the `invoc-host` record of the same
/// invocation, in either order, and scopes task types to workflows through
/// the `wf-name` record of each run.
#[derive(Debug, Default)]
pub struct LogStatisticsStore {
    state: RwLock<LogStoreState>,
}

impl LogStatisticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of complete statistics held.
    pub fn len(&self) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.stats.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn missing(record: &LogRecord, what: &str) -> SchedError {
    SchedError::MalformedRecord(format!(
        "{} record at {} carries no {what}",
        record.key, record.timestamp
    ))
}

impl StatisticsStore for LogStatisticsStore {
    fn host_names(&self) -> Result<BTreeSet<HostId>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.host_by_invocation.values().cloned().collect())
    }

    fn task_type_ids(&self, workflow: &str) -> Result<BTreeSet<TaskTypeId>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .workflow_by_run
            .iter()
            .filter(|(_, name)| name.as_str() == workflow)
            .filter_map(|(run_id, _)| state.task_types_by_run.get(run_id))
            .flatten()
            .copied()
            .collect())
    }

    fn statistics_since(
        &self,
        task_type: TaskTypeId,
        host: &str,
        since: Timestamp,
    ) -> Result<Vec<InvocationStat>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .stats
            .get(&(task_type, host.to_string()))
            .map(|series| {
                series
                    .iter()
                    .filter(|s| s.timestamp > since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn append(&self, record: &LogRecord) -> Result<()> {
        let update = decode(record)?;
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(update);
        Ok(())
    }

    /// Decodes the whole run first; a single bad record leaves the store
    /// untouched.
    fn append_run(&self, records: &[LogRecord]) -> Result<()> {
        let updates = records.iter().map(decode).collect::<Result<Vec<_>>>()?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for update in updates {
            state.apply(update);
        }
        Ok(())
    }
}
