// src/engine/core.rs

//! Pure core runtime.
//!
//! [`CoreRuntime::step`] consumes one [`ClusterEvent`], updates the shared
//! [`Scheduler`] and returns the commands the IO shell should carry out. No
//! Tokio types and no IO, so every cluster interaction can be driven from a
//! plain test.

use std::sync::Arc;

use crate::engine::event_handlers::{
    CoreStep, handle_container_allocated, handle_container_completed, handle_launch_failed,
    handle_task_ready, handle_tasks_added,
};
use crate::engine::{ClusterEvent, RuntimeOptions};
use crate::errors::Result;
use crate::sched::Scheduler;

#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Arc<Scheduler>,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Arc<Scheduler>, options: RuntimeOptions) -> Self {
        Self { scheduler, options }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Handle one event. Errors are scheduler invariant violations and leave
    /// the run unusable.
    pub fn step(&mut self, event: ClusterEvent) -> Result<CoreStep> {
        let scheduler = self.scheduler.as_ref();
        match event {
            ClusterEvent::TasksAdded(tasks) => handle_tasks_added(scheduler, tasks),
            ClusterEvent::TaskReady(task) => handle_task_ready(scheduler, task),
            ClusterEvent::ContainerAllocated(container) => {
                handle_container_allocated(scheduler, container)
            }
            ClusterEvent::ContainerCompleted { status, runtime_ms } => {
                handle_container_completed(scheduler, &self.options, status, runtime_ms)
            }
            ClusterEvent::LaunchFailed {
                container_id,
                reason,
            } => handle_launch_failed(scheduler, &self.options, container_id, reason),
            ClusterEvent::ShutdownRequested => Ok(CoreStep::stop()),
        }
    }
}
