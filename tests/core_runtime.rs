// tests/core_runtime.rs

mod common;
use crate::common::builders::{TaskBuilder, ready_tasks};
use crate::common::init_tracing;

use std::sync::Arc;

use wfsched::engine::event_handlers::LAUNCH_FAILED_EXIT_CODE;
use wfsched::engine::{ClusterEvent, CoreCommand, CoreRuntime, RuntimeOptions};
use wfsched::sched::{GreedyQueue, Scheduler, TaskState};
use wfsched::types::{Container, ContainerStatus, NodeRequest};

fn core(retry_budget: u32, exit_when_idle: bool) -> CoreRuntime {
    let scheduler = Arc::new(Scheduler::new(Box::new(GreedyQueue::new()), retry_budget));
    CoreRuntime::new(scheduler, RuntimeOptions { exit_when_idle })
}

fn completed(container: &str, exit_code: i32) -> ClusterEvent {
    ClusterEvent::ContainerCompleted {
        status: ContainerStatus::new(container, exit_code),
        runtime_ms: 50,
    }
}

#[test]
fn added_ready_tasks_request_containers() {
    init_tracing();
    let mut core = core(2, false);

    let step = core
        .step(ClusterEvent::TasksAdded(vec![
            TaskBuilder::new(1).ready().build(),
            TaskBuilder::new(2).build(),
        ]))
        .unwrap();

    assert!(step.keep_running);
    assert_eq!(
        step.commands,
        vec![CoreCommand::RequestContainers(vec![NodeRequest])]
    );

    let step = core.step(ClusterEvent::TaskReady(2)).unwrap();
    assert_eq!(
        step.commands,
        vec![CoreCommand::RequestContainers(vec![NodeRequest])]
    );
}

#[test]
fn allocated_container_launches_head_task() {
    init_tracing();
    let mut core = core(2, false);
    core.step(ClusterEvent::TasksAdded(ready_tasks(1, 2, 0))).unwrap();

    let container = Container::new("c1", "h1");
    let step = core
        .step(ClusterEvent::ContainerAllocated(container.clone()))
        .unwrap();

    match step.commands.as_slice() {
        [CoreCommand::Launch { container: c, task }] => {
            assert_eq!(c, &container);
            assert_eq!(task.id, 1);
            assert_eq!(task.tries, 1);
        }
        other => panic!("Expected one Launch, got: {other:?}"),
    }
}

#[test]
fn surplus_container_is_released() {
    init_tracing();
    let mut core = core(2, false);

    let step = core
        .step(ClusterEvent::ContainerAllocated(Container::new("spare", "h1")))
        .unwrap();
    assert_eq!(
        step.commands,
        vec![CoreCommand::Release(vec!["spare".to_string()])]
    );
}

#[test]
fn non_zero_exit_retries_then_aborts() {
    init_tracing();
    let mut core = core(2, false);
    core.step(ClusterEvent::TasksAdded(ready_tasks(1, 1, 0))).unwrap();

    core.step(ClusterEvent::ContainerAllocated(Container::new("c1", "h1")))
        .unwrap();
    let step = core.step(completed("c1", 1)).unwrap();
    assert_eq!(
        step.commands,
        vec![CoreCommand::RequestContainers(vec![NodeRequest])]
    );

    core.step(ClusterEvent::ContainerAllocated(Container::new("c2", "h1")))
        .unwrap();
    let step = core.step(completed("c2", 1)).unwrap();
    assert_eq!(step.commands, vec![CoreCommand::TaskAborted(1)]);
    assert_eq!(core.scheduler().task_state(1), Some(TaskState::Aborted));
}

#[test]
fn launch_failure_counts_as_task_failure() {
    init_tracing();
    let mut core = core(3, false);
    core.step(ClusterEvent::TasksAdded(ready_tasks(1, 1, 0))).unwrap();
    core.step(ClusterEvent::ContainerAllocated(Container::new("c1", "h1")))
        .unwrap();

    let step = core
        .step(ClusterEvent::LaunchFailed {
            container_id: "c1".to_string(),
            reason: "image pull failed".to_string(),
        })
        .unwrap();

    assert_eq!(
        step.commands,
        vec![
            CoreCommand::RequestContainers(vec![NodeRequest]),
            CoreCommand::Release(vec!["c1".to_string()]),
        ]
    );
    assert_eq!(core.scheduler().task_state(1), Some(TaskState::Ready));
    assert_eq!(core.scheduler().running_task("c1"), None);
    assert!(LAUNCH_FAILED_EXIT_CODE != 0);

    // The released container's own completion is ignored.
    let step = core.step(completed("c1", 0)).unwrap();
    assert!(step.commands.is_empty());
    assert_eq!(core.scheduler().task_state(1), Some(TaskState::Ready));
}

#[test]
fn exits_once_everything_settles() {
    init_tracing();
    let mut core = core(1, true);
    core.step(ClusterEvent::TasksAdded(ready_tasks(1, 2, 0))).unwrap();
    core.step(ClusterEvent::ContainerAllocated(Container::new("c1", "h1")))
        .unwrap();
    core.step(ClusterEvent::ContainerAllocated(Container::new("c2", "h2")))
        .unwrap();

    let step = core.step(completed("c1", 0)).unwrap();
    assert!(step.keep_running);

    let step = core.step(completed("c2", 9)).unwrap();
    assert!(!step.keep_running);
    assert_eq!(
        step.commands,
        vec![CoreCommand::TaskAborted(2), CoreCommand::RequestExit]
    );
}

#[test]
fn shutdown_stops_without_commands() {
    let mut core = core(1, false);
    let step = core.step(ClusterEvent::ShutdownRequested).unwrap();
    assert!(!step.keep_running);
    assert!(step.commands.is_empty());
}

#[test]
fn invariant_violations_surface_as_errors() {
    init_tracing();
    let mut core = core(1, false);
    assert!(core.step(ClusterEvent::TaskReady(42)).is_err());
}
