// src/logs/mod.rs

//! Event log reconstruction.
//!
//! A run's log is an interleaved, possibly duplicated stream of lifecycle
//! records. Reconstruction runs three passes over it:
//!
//! - [`cleanup`]: deduplicate, exclude failed containers, link cluster events
//!   to invocations, sort by timestamp.
//! - [`assembly`]: per-invocation phase timings and run aggregates.
//! - [`idle`]: container time with no ready task.
//!
//! [`report`] turns the result into lifecycle breakdowns. Any error aborts the
//! whole reconstruction; callers must discard the run rather than use a
//! partial result.

pub mod assembly;
pub mod cleanup;
pub mod idle;
pub mod record;
pub mod report;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::errors::Result;
use crate::types::InvocationId;

pub use assembly::{Invocation, Phases, WorkflowRun};
pub use record::{ClusterEventKind, Linkage, LogRecord, RecordKey, RecordValue};
pub use report::{Increment, LifecycleBreakdown, RunReport};

/// Output of a successful reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    /// Deduplicated, cross-linked records in timestamp order.
    pub records: Vec<LogRecord>,
    pub invocations: BTreeMap<InvocationId, Invocation>,
    pub run: WorkflowRun,
}

impl Reconstruction {
    /// Write the cleaned records as JSON lines.
    pub fn write_cleaned(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, record::render_records(&self.records)?)?;
        Ok(())
    }

    pub fn report(&self) -> RunReport {
        RunReport::from_reconstruction(self)
    }
}

/// Run all three passes over one run's records.
pub fn reconstruct(records: Vec<LogRecord>) -> Result<Reconstruction> {
    let records = cleanup::clean(records)?;
    let (invocations, mut run) = assembly::assemble(&records)?;
    run.no_task_ready_time = idle::no_task_ready_time(&records, &run)?;

    info!(
        workflow = run.name.as_deref().unwrap_or("<unnamed>"),
        records = records.len(),
        invocations = invocations.len(),
        peak_containers = run.peak_containers,
        no_task_ready_time = run.no_task_ready_time,
        "reconstructed workflow run"
    );

    Ok(Reconstruction {
        records,
        invocations,
        run,
    })
}

/// Read a JSON-lines log from disk and reconstruct it.
pub fn reconstruct_file(path: impl AsRef<Path>) -> Result<Reconstruction> {
    let records = record::read_records(path)?;
    reconstruct(records)
}
