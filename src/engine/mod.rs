// src/engine/mod.rs

//! Cluster-facing orchestration around the [`Scheduler`](crate::sched::Scheduler).
//!
//! The pure state machine lives in [`core`]: it turns [`ClusterEvent`]s into
//! [`CoreCommand`]s without touching channels or the cluster. The async shell
//! in [`runtime`] feeds it events and hands commands to a
//! [`ClusterBackend`].

use crate::sched::TaskInstance;
use crate::types::{Container, ContainerId, ContainerStatus, TaskId};

/// Runtime options shared by the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Stop once every added task has finished or been aborted.
    pub exit_when_idle: bool,
}

/// Events from the workflow layer and the cluster.
#[derive(Debug, Clone)]
pub enum ClusterEvent {
    /// New tasks parsed from the workflow.
    TasksAdded(Vec<TaskInstance>),
    /// A task's dependencies are satisfied.
    TaskReady(TaskId),
    /// The resource manager granted a container.
    ContainerAllocated(Container),
    /// A container exited.
    ContainerCompleted {
        status: ContainerStatus,
        runtime_ms: u64,
    },
    /// The node manager could not start the task in a container.
    LaunchFailed {
        container_id: ContainerId,
        reason: String,
    },
    ShutdownRequested,
}

pub mod backend;
pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use backend::ClusterBackend;
pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
