// src/types.rs

//! Identifiers and small value types shared across the crate.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Milliseconds since the epoch, as written in the event log.
pub type Timestamp = u64;

/// Identifier of a task type (the class of work, e.g. "align").
pub type TaskTypeId = u64;

/// Identifier of one concrete execution attempt.
pub type InvocationId = u64;

/// Identifier of a schedulable task instance.
pub type TaskId = u64;

/// Cluster node host name.
pub type HostId = String;

/// Opaque container identifier handed out by the resource manager.
pub type ContainerId = String;

/// A container granted by the resource manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: ContainerId,
    pub host: HostId,
}

impl Container {
    pub fn new(id: impl Into<ContainerId>, host: impl Into<HostId>) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.host)
    }
}

/// Final status of a container as reported by the resource manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub container_id: ContainerId,
    pub exit_code: i32,
    pub diagnostics: String,
}

impl ContainerStatus {
    pub fn new(container_id: impl Into<ContainerId>, exit_code: i32) -> Self {
        Self {
            container_id: container_id.into(),
            exit_code,
            diagnostics: String::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Demand for one more container.
///
/// Enqueued once per task that becomes ready. It carries no task identity:
/// whichever ready task the policy picks fills the container that answers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeRequest;

/// Which assignment policy the scheduler runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Strict arrival-order queue.
    GreedyQueue,
    /// Prefer the ready task type that runs fastest on the offered host.
    EstimateAware,
}

impl Default for PolicyKind {
    fn default() -> Self {
        PolicyKind::GreedyQueue
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "greedy-queue" => Ok(PolicyKind::GreedyQueue),
            "estimate-aware" => Ok(PolicyKind::EstimateAware),
            other => Err(format!(
                "invalid policy: {other} (expected \"greedy-queue\" or \"estimate-aware\")"
            )),
        }
    }
}

/// Backend holding historical invocation statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatisticsBackend {
    /// Seeded from reconstructed event logs on disk.
    Log,
    /// Starts empty; only sees records appended at runtime.
    Memory,
}

impl Default for StatisticsBackend {
    fn default() -> Self {
        StatisticsBackend::Log
    }
}
