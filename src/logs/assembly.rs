// src/logs/assembly.rs

//! Second reconstruction pass: build per-invocation phase timings and the
//! run-level aggregates from cleaned, sorted records.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use tracing::debug;

use crate::errors::{Result, SchedError};
use crate::logs::record::{ClusterEventKind, LogRecord, RecordKey};
use crate::types::{HostId, InvocationId, TaskTypeId, Timestamp};

/// Durations (ms) of the six lifecycle phases of one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Phases {
    pub scheduling: u64,
    pub startup: u64,
    pub stage_in: u64,
    pub execution: u64,
    pub stage_out: u64,
    pub shutdown: u64,
}

impl Phases {
    /// Sum of all six phases, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        [self.startup, self.stage_in, self.execution, self.stage_out, self.shutdown]
            .into_iter()
            .fold(self.scheduling, u64::saturating_add)
    }
}

/// Saturating: `realTime` values are only bounded by `i64::MAX`.
impl AddAssign for Phases {
    fn add_assign(&mut self, rhs: Self) {
        self.scheduling = self.scheduling.saturating_add(rhs.scheduling);
        self.startup = self.startup.saturating_add(rhs.startup);
        self.stage_in = self.stage_in.saturating_add(rhs.stage_in);
        self.execution = self.execution.saturating_add(rhs.execution);
        self.stage_out = self.stage_out.saturating_add(rhs.stage_out);
        self.shutdown = self.shutdown.saturating_add(rhs.shutdown);
    }
}

/// Timestamps observed for an invocation, used to derive startup and shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PhaseMarks {
    allocated_at: Option<Timestamp>,
    completed_at: Option<Timestamp>,
    stage_in_end: Option<Timestamp>,
    exec_end: Option<Timestamp>,
    stage_out_end: Option<Timestamp>,
}

/// One task execution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub id: InvocationId,
    pub task_name: String,
    pub task_type_id: Option<TaskTypeId>,
    pub host_name: Option<HostId>,
    pub phases: Phases,
    /// When execution began (end of the timed record minus its duration).
    pub exec_timestamp: Option<Timestamp>,
    /// Cumulative bytes of staged-in input files.
    pub file_size: u64,
    marks: PhaseMarks,
}

impl Invocation {
    fn new(id: InvocationId, record: &LogRecord) -> Self {
        Self {
            id,
            task_name: record.linkage.task_name.clone().unwrap_or_default(),
            task_type_id: record.linkage.task_type_id,
            host_name: None,
            phases: Phases::default(),
            exec_timestamp: None,
            file_size: 0,
            marks: PhaseMarks::default(),
        }
    }

    /// Derive startup and shutdown from the recorded phase boundaries.
    fn finish(&mut self) {
        let stage_in_start = self
            .marks
            .stage_in_end
            .map(|end| end.saturating_sub(self.phases.stage_in));
        let first_work = stage_in_start.or(self.exec_timestamp);
        if let (Some(allocated), Some(start)) = (self.marks.allocated_at, first_work) {
            self.phases.startup = start.saturating_sub(allocated);
        }

        let last_work = self.marks.stage_out_end.or(self.marks.exec_end);
        if let (Some(end), Some(completed)) = (last_work, self.marks.completed_at) {
            self.phases.shutdown = completed.saturating_sub(end);
        }
    }
}

/// Run-level aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowRun {
    pub name: Option<String>,
    /// Timestamp of the `wf-name` record.
    pub onset: Option<Timestamp>,
    /// Measured total runtime (ms) from the `wf-time` record.
    pub runtime: u64,
    /// Most containers held at once.
    pub peak_containers: u64,
    /// Container-milliseconds during which allocated capacity exceeded demand.
    pub no_task_ready_time: u64,
}

fn require_invocation<'a>(
    invocations: &'a mut BTreeMap<InvocationId, Invocation>,
    record: &LogRecord,
) -> Result<&'a mut Invocation> {
    record
        .linkage
        .invocation_id
        .and_then(|id| invocations.get_mut(&id))
        .ok_or_else(|| {
            SchedError::MalformedRecord(format!(
                "{} record at {} carries no invocation id",
                record.key, record.timestamp
            ))
        })
}

/// Walk sorted records and assemble invocations plus the run aggregates.
///
/// `no_task_ready_time` is left at zero; the third pass fills it in.
pub fn assemble(records: &[LogRecord]) -> Result<(BTreeMap<InvocationId, Invocation>, WorkflowRun)> {
    let mut invocations: BTreeMap<InvocationId, Invocation> = BTreeMap::new();
    let mut run = WorkflowRun::default();
    let mut current_containers: i64 = 0;
    let mut peak_containers: i64 = 0;

    for record in records {
        if let Some(id) = record.linkage.invocation_id {
            invocations
                .entry(id)
                .or_insert_with(|| Invocation::new(id, record));
        }

        match record.key {
            RecordKey::ClusterEvent => match record.cluster_event()? {
                Some(ClusterEventKind::Allocated { .. }) => {
                    current_containers += 1;
                    peak_containers = peak_containers.max(current_containers);
                    if let Some(invocation) =
                        record.linkage.invocation_id.and_then(|id| invocations.get_mut(&id))
                    {
                        invocation.marks.allocated_at = Some(record.timestamp);
                    }
                }
                Some(ClusterEventKind::Completed { .. }) => {
                    current_containers -= 1;
                    if let Some(invocation) =
                        record.linkage.invocation_id.and_then(|id| invocations.get_mut(&id))
                    {
                        invocation.marks.completed_at = Some(record.timestamp);
                    }
                }
                _ => {}
            },
            RecordKey::InvocTimeSched => {
                let real_time = record.value.real_time()?;
                require_invocation(&mut invocations, record)?.phases.scheduling = real_time;
            }
            RecordKey::InvocHost => {
                let host = record.value.raw_str()?;
                require_invocation(&mut invocations, record)?.host_name = Some(host);
            }
            RecordKey::InvocTime => {
                let real_time = record.value.real_time()?;
                let invocation = require_invocation(&mut invocations, record)?;
                invocation.phases.execution = real_time;
                invocation.marks.exec_end = Some(record.timestamp);
                invocation.exec_timestamp = Some(record.timestamp.saturating_sub(real_time));
            }
            RecordKey::InvocTimeStagein => {
                let real_time = record.value.real_time()?;
                let invocation = require_invocation(&mut invocations, record)?;
                invocation.phases.stage_in = real_time;
                invocation.marks.stage_in_end = Some(record.timestamp);
            }
            RecordKey::InvocTimeStageout => {
                let real_time = record.value.real_time()?;
                let invocation = require_invocation(&mut invocations, record)?;
                invocation.phases.stage_out = real_time;
                invocation.marks.stage_out_end = Some(record.timestamp);
            }
            RecordKey::WorkflowName => {
                run.onset = Some(record.timestamp);
                run.name = Some(record.value.raw_str()?);
            }
            RecordKey::WorkflowTime => {
                run.runtime = record.value.raw_u64()?;
            }
            RecordKey::FileSizeStagein => {
                let size = record.value.raw_u64()?;
                let invocation = require_invocation(&mut invocations, record)?;
                invocation.file_size = invocation.file_size.saturating_add(size);
            }
            RecordKey::InvocExec | RecordKey::InvocOutput | RecordKey::Other(_) => {}
        }
    }

    for invocation in invocations.values_mut() {
        invocation.finish();
    }

    run.peak_containers = u64::try_from(peak_containers).unwrap_or(0);

    debug!(
        invocations = invocations.len(),
        peak_containers = run.peak_containers,
        runtime = run.runtime,
        "assembled invocations"
    );

    Ok((invocations, run))
}
