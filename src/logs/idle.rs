// src/logs/idle.rs

//! Third reconstruction pass: time during which held containers had no
//! ready task to run.

use crate::errors::Result;
use crate::logs::assembly::WorkflowRun;
use crate::logs::record::{ClusterEventKind, LogRecord, RecordKey};

/// Accumulate `max(0, peak - ready) * elapsed` over the sorted records.
///
/// The ready count rises on `invoc-exec` and falls on `container-completed`.
/// Elapsed time is measured from the run onset (or the first record when the
/// log has no `wf-name`) and never goes backwards, so the result is never
/// negative.
pub fn no_task_ready_time(records: &[LogRecord], run: &WorkflowRun) -> Result<u64> {
    let Some(first) = records.first() else {
        return Ok(0);
    };

    let peak = i64::try_from(run.peak_containers).unwrap_or(i64::MAX);
    let mut last_timestamp = run.onset.unwrap_or(first.timestamp);
    let mut ready_tasks: i64 = 0;
    let mut total: u64 = 0;

    for record in records {
        match record.key {
            RecordKey::InvocExec => ready_tasks += 1,
            RecordKey::ClusterEvent => {
                if let Some(ClusterEventKind::Completed { .. }) = record.cluster_event()? {
                    ready_tasks -= 1;
                }
            }
            _ => {}
        }

        let idle_containers = u64::try_from((peak - ready_tasks).max(0)).unwrap_or(0);
        let elapsed = record.timestamp.saturating_sub(last_timestamp);
        total = total.saturating_add(idle_containers.saturating_mul(elapsed));
        last_timestamp = last_timestamp.max(record.timestamp);
    }

    Ok(total)
}
