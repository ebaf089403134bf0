// src/estimate/mod.rs

//! Per-host, per-task-type runtime estimates.
//!
//! The [`RuntimeEstimator`] pulls statistics incrementally from a
//! [`StatisticsStore`]. Each host has a watermark: the newest statistic
//! timestamp already folded into its estimates. A resync only asks the store
//! for statistics strictly newer than that, so calling it repeatedly never
//! applies a statistic twice.
//!
//! Readers get an immutable [`EstimatorState`] snapshot. A resync builds the
//! next state off to the side and swaps it in only when every store query
//! succeeded.

pub mod poller;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use crate::errors::Result;
use crate::stats::{InvocationStat, StatisticsStore};
use crate::types::{HostId, TaskTypeId, Timestamp};

pub use poller::spawn_resync_loop;

/// Running-average estimate for one (host, task type) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeEstimate {
    pub task_type: TaskTypeId,
    /// Value consulted by estimate-aware policies; the average runtime (ms).
    pub weight: f64,
    pub finished_tasks: u64,
    pub time_spent_ms: u64,
}

impl RuntimeEstimate {
    pub fn new(task_type: TaskTypeId) -> Self {
        Self {
            task_type,
            weight: 0.0,
            finished_tasks: 0,
            time_spent_ms: 0,
        }
    }

    /// Fold one observed runtime into the average.
    pub fn observe(&mut self, real_time_ms: u64) {
        self.finished_tasks += 1;
        self.time_spent_ms = self.time_spent_ms.saturating_add(real_time_ms);
        self.weight = self.time_spent_ms as f64 / self.finished_tasks as f64;
    }

    pub fn average_runtime(&self) -> Option<f64> {
        (self.finished_tasks > 0).then_some(self.weight)
    }
}

/// Immutable snapshot of all estimates and watermarks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstimatorState {
    estimates: BTreeMap<HostId, BTreeMap<TaskTypeId, RuntimeEstimate>>,
    watermarks: BTreeMap<HostId, Timestamp>,
    task_types: BTreeSet<TaskTypeId>,
}

impl EstimatorState {
    pub fn estimate(&self, host: &str, task_type: TaskTypeId) -> Option<&RuntimeEstimate> {
        self.estimates.get(host)?.get(&task_type)
    }

    /// Weight for a pair, or `None` if nothing has been observed for it yet.
    pub fn weight(&self, host: &str, task_type: TaskTypeId) -> Option<f64> {
        self.estimate(host, task_type)?.average_runtime()
    }

    pub fn watermark(&self, host: &str) -> Option<Timestamp> {
        self.watermarks.get(host).copied()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.estimates.keys().map(String::as_str)
    }

    pub fn task_types(&self) -> impl Iterator<Item = TaskTypeId> + '_ {
        self.task_types.iter().copied()
    }

    /// Every (host, estimate) pair.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuntimeEstimate)> {
        self.estimates
            .iter()
            .flat_map(|(host, per_task)| per_task.values().map(move |e| (host.as_str(), e)))
    }

    fn add_host(&mut self, host: HostId) {
        let per_task = self
            .task_types
            .iter()
            .map(|&tt| (tt, RuntimeEstimate::new(tt)))
            .collect();
        self.estimates.insert(host.clone(), per_task);
        self.watermarks.insert(host, 0);
    }

    fn add_task_type(&mut self, task_type: TaskTypeId) {
        self.task_types.insert(task_type);
        for per_task in self.estimates.values_mut() {
            per_task
                .entry(task_type)
                .or_insert_with(|| RuntimeEstimate::new(task_type));
        }
    }

    fn apply(&mut self, stat: &InvocationStat) {
        if let Some(estimate) = self
            .estimates
            .get_mut(&stat.host)
            .and_then(|per_task| per_task.get_mut(&stat.task_type))
        {
            estimate.observe(stat.real_time_ms);
        }
    }
}

/// What a resync changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResyncSummary {
    pub new_hosts: usize,
    pub new_task_types: usize,
    pub statistics_applied: usize,
}

/// Owns the estimates for one workflow and keeps them in sync with a store.
#[derive(Debug)]
pub struct RuntimeEstimator {
    store: Arc<dyn StatisticsStore>,
    workflow: String,
    state: RwLock<Arc<EstimatorState>>,
    resync_guard: Mutex<()>,
}

impl RuntimeEstimator {
    pub fn new(store: Arc<dyn StatisticsStore>, workflow: impl Into<String>) -> Self {
        Self {
            store,
            workflow: workflow.into(),
            state: RwLock::new(Arc::new(EstimatorState::default())),
            resync_guard: Mutex::new(()),
        }
    }

    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    pub fn store(&self) -> &Arc<dyn StatisticsStore> {
        &self.store
    }

    /// Current estimates. Never torn; may be one resync behind.
    pub fn snapshot(&self) -> Arc<EstimatorState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Pull new hosts, task types and statistics from the store.
    ///
    /// Only one resync runs at a time. On any store error the previous state
    /// is kept unchanged and the error is returned.
    pub fn resync(&self) -> Result<ResyncSummary> {
        let _guard = self.resync_guard.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.snapshot();
        let mut next = (*current).clone();
        let mut summary = ResyncSummary::default();

        for host in self.store.host_names()? {
            if !next.estimates.contains_key(&host) {
                debug!(host = %host, "tracking new host");
                next.add_host(host);
                summary.new_hosts += 1;
            }
        }

        for task_type in self.store.task_type_ids(&self.workflow)? {
            if !next.task_types.contains(&task_type) {
                debug!(task_type, "tracking new task type");
                next.add_task_type(task_type);
                summary.new_task_types += 1;
            }
        }

        let hosts: Vec<HostId> = next.estimates.keys().cloned().collect();
        let task_types: Vec<TaskTypeId> = next.task_types.iter().copied().collect();

        for host in hosts {
            let old_watermark = next.watermarks.get(&host).copied().unwrap_or(0);
            let mut new_watermark = old_watermark;

            for &task_type in &task_types {
                for stat in self.store.statistics_since(task_type, &host, old_watermark)? {
                    new_watermark = new_watermark.max(stat.timestamp);
                    next.apply(&stat);
                    summary.statistics_applied += 1;
                }
            }

            next.watermarks.insert(host, new_watermark);
        }

        if next != *current {
            *self.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        }

        info!(
            workflow = %self.workflow,
            new_hosts = summary.new_hosts,
            new_task_types = summary.new_task_types,
            statistics_applied = summary.statistics_applied,
            "runtime estimates resynced"
        );

        Ok(summary)
    }
}
