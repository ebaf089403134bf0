// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, info, warn};

use crate::engine::RuntimeOptions;
use crate::errors::Result;
use crate::sched::{FailureOutcome, Scheduler, TaskInstance};
use crate::types::{Container, ContainerId, ContainerStatus, NodeRequest, TaskId};

/// Exit code recorded for a task whose container never started it.
pub const LAUNCH_FAILED_EXIT_CODE: i32 = -1;

/// Command produced by the pure core, carried out by the IO shell.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommand {
    /// Ask the resource manager for one container per request.
    RequestContainers(Vec<NodeRequest>),
    /// Start `task` in `container`.
    Launch {
        container: Container,
        task: TaskInstance,
    },
    /// Hand containers back to the resource manager.
    Release(Vec<ContainerId>),
    /// The task exhausted its retry budget; its dependents must be aborted.
    TaskAborted(TaskId),
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    fn proceed(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub(crate) fn stop() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: false,
        }
    }
}

fn request_pending(scheduler: &Scheduler, commands: &mut Vec<CoreCommand>) {
    let requests = scheduler.drain_node_requests();
    if !requests.is_empty() {
        debug!(count = requests.len(), "requesting containers");
        commands.push(CoreCommand::RequestContainers(requests));
    }
}

fn finish_step(
    scheduler: &Scheduler,
    options: &RuntimeOptions,
    mut commands: Vec<CoreCommand>,
) -> CoreStep {
    let progress = scheduler.progress();
    if options.exit_when_idle && progress.remaining == 0 && progress.running == 0 {
        info!(
            finished = progress.finished_this_run(),
            aborted = progress.aborted,
            "all tasks settled; requesting exit"
        );
        commands.push(CoreCommand::RequestExit);
        return CoreStep {
            commands,
            keep_running: false,
        };
    }
    CoreStep::proceed(commands)
}

pub fn handle_tasks_added(scheduler: &Scheduler, tasks: Vec<TaskInstance>) -> Result<CoreStep> {
    let count = tasks.len();
    let ready = scheduler.add_tasks(tasks)?;
    info!(count, ready, "tasks added");

    let mut commands = Vec::new();
    request_pending(scheduler, &mut commands);
    Ok(CoreStep::proceed(commands))
}

pub fn handle_task_ready(scheduler: &Scheduler, task: TaskId) -> Result<CoreStep> {
    scheduler.mark_ready(task)?;

    let mut commands = Vec::new();
    request_pending(scheduler, &mut commands);
    Ok(CoreStep::proceed(commands))
}

/// Fill a fresh container, or give it back if nothing is ready.
///
/// More containers than ready tasks is normal: a retry may have been picked
/// up by a container requested for another task.
pub fn handle_container_allocated(scheduler: &Scheduler, container: Container) -> Result<CoreStep> {
    match scheduler.try_assign(&container)? {
        Some(task) => Ok(CoreStep::proceed(vec![CoreCommand::Launch { container, task }])),
        None => {
            debug!(container = %container, "no ready task; releasing container");
            Ok(CoreStep::proceed(vec![CoreCommand::Release(vec![
                container.id,
            ])]))
        }
    }
}

pub fn handle_container_completed(
    scheduler: &Scheduler,
    options: &RuntimeOptions,
    status: ContainerStatus,
    runtime_ms: u64,
) -> Result<CoreStep> {
    let Some(task) = scheduler.running_task(&status.container_id) else {
        debug!(
            container = %status.container_id,
            exit_code = status.exit_code,
            "completed container had no running task"
        );
        return Ok(finish_step(scheduler, options, Vec::new()));
    };

    let mut commands = Vec::new();
    if status.succeeded() {
        let release = scheduler.completed(task, &status, runtime_ms)?;
        if !release.is_empty() {
            commands.push(CoreCommand::Release(release));
        }
    } else {
        handle_failure(scheduler, task, &status, &mut commands)?;
    }

    Ok(finish_step(scheduler, options, commands))
}

pub fn handle_launch_failed(
    scheduler: &Scheduler,
    options: &RuntimeOptions,
    container_id: ContainerId,
    reason: String,
) -> Result<CoreStep> {
    let mut commands = Vec::new();

    match scheduler.running_task(&container_id) {
        Some(task) => {
            warn!(task, container = %container_id, reason = %reason, "launch failed");
            let status = ContainerStatus {
                container_id: container_id.clone(),
                exit_code: LAUNCH_FAILED_EXIT_CODE,
                diagnostics: reason,
            };
            handle_failure(scheduler, task, &status, &mut commands)?;
        }
        None => {
            warn!(container = %container_id, reason = %reason, "launch failed for idle container");
        }
    }

    commands.push(CoreCommand::Release(vec![container_id]));
    Ok(finish_step(scheduler, options, commands))
}

fn handle_failure(
    scheduler: &Scheduler,
    task: TaskId,
    status: &ContainerStatus,
    commands: &mut Vec<CoreCommand>,
) -> Result<()> {
    match scheduler.failed(task, status)? {
        FailureOutcome::Retrying { .. } => request_pending(scheduler, commands),
        FailureOutcome::RetryExhausted { .. } => commands.push(CoreCommand::TaskAborted(task)),
    }
    Ok(())
}
