// src/logs/report.rs

//! Lifecycle breakdowns and the tab-separated run report.

use std::collections::BTreeMap;

use crate::logs::Reconstruction;
use crate::logs::assembly::{Invocation, Phases, WorkflowRun};

/// Summed phase durations over a set of invocations, plus (for the whole
/// run) the idle container time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleBreakdown {
    pub idle: Option<i64>,
    pub phases: Phases,
}

impl LifecycleBreakdown {
    /// Sum the phases of `invocations`. With `with_idle`, also compute
    /// `peak * runtime - no_task_ready_time - sum(phases)`.
    pub fn of<'a>(
        run: &WorkflowRun,
        invocations: impl IntoIterator<Item = &'a Invocation>,
        with_idle: bool,
    ) -> Self {
        let mut phases = Phases::default();
        for invocation in invocations {
            phases += invocation.phases;
        }

        let idle = with_idle.then(|| {
            let capacity = i128::from(run.peak_containers) * i128::from(run.runtime);
            let idle = capacity - i128::from(run.no_task_ready_time) - i128::from(phases.total());
            i64::try_from(idle).unwrap_or(if idle < 0 { i64::MIN } else { i64::MAX })
        });

        Self { idle, phases }
    }

    fn cells(&self) -> Vec<String> {
        let p = &self.phases;
        let mut cells = Vec::with_capacity(7);
        if let Some(idle) = self.idle {
            cells.push(idle.to_string());
        }
        cells.extend(
            [p.scheduling, p.startup, p.stage_in, p.execution, p.stage_out, p.shutdown]
                .iter()
                .map(u64::to_string),
        );
        cells
    }
}

const PHASE_COLUMNS: [&str; 6] = [
    "scheduling",
    "startup",
    "stage-in",
    "execution",
    "stage-out",
    "shutdown",
];

fn headers(category: &str, with_idle: bool) -> Vec<String> {
    let mut cols = Vec::with_capacity(7);
    if with_idle {
        cols.push(format!("{category} idle"));
    }
    cols.extend(PHASE_COLUMNS.iter().map(|phase| format!("{category} {phase}")));
    cols
}

/// One report row: runtime, the whole-run breakdown, and one breakdown per
/// task type (sorted by name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub runtime: u64,
    pub total: LifecycleBreakdown,
    pub per_task: BTreeMap<String, LifecycleBreakdown>,
}

impl RunReport {
    pub fn from_reconstruction(recon: &Reconstruction) -> Self {
        let mut by_task: BTreeMap<String, Vec<&Invocation>> = BTreeMap::new();
        for invocation in recon.invocations.values() {
            by_task
                .entry(invocation.task_name.clone())
                .or_default()
                .push(invocation);
        }

        let per_task = by_task
            .into_iter()
            .map(|(name, invocs)| {
                let breakdown = LifecycleBreakdown::of(&recon.run, invocs, false);
                (name, breakdown)
            })
            .collect();

        Self {
            runtime: recon.run.runtime,
            total: LifecycleBreakdown::of(&recon.run, recon.invocations.values(), true),
            per_task,
        }
    }

    pub fn header(&self) -> String {
        let mut cols = vec!["runtime".to_string()];
        cols.extend(headers("total", true));
        for name in self.per_task.keys() {
            cols.extend(headers(name, false));
        }
        cols.join("\t")
    }

    pub fn row(&self) -> String {
        let mut cells = vec![self.runtime.to_string()];
        cells.extend(self.total.cells());
        for breakdown in self.per_task.values() {
            cells.extend(breakdown.cells());
        }
        cells.join("\t")
    }
}

/// Difference between two consecutive invocations of the same task type on
/// the same host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment {
    pub execution_delta: i64,
    pub file_size_delta: i64,
}

/// Successive (execution time, input size) deltas for `task_name` on `host`,
/// ordered by execution start.
pub fn increments(recon: &Reconstruction, task_name: &str, host: &str) -> Vec<Increment> {
    let mut invocs: Vec<&Invocation> = recon
        .invocations
        .values()
        .filter(|i| i.task_name == task_name && i.host_name.as_deref() == Some(host))
        .collect();
    invocs.sort_by_key(|i| i.exec_timestamp.unwrap_or(0));

    invocs
        .windows(2)
        .map(|pair| Increment {
            execution_delta: to_i64(pair[1].phases.execution) - to_i64(pair[0].phases.execution),
            file_size_delta: to_i64(pair[1].file_size) - to_i64(pair[0].file_size),
        })
        .collect()
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
