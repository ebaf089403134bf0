// tests/scheduler_lifecycle.rs

mod common;
use crate::common::builders::{TaskBuilder, ready_tasks};
use crate::common::init_tracing;

use std::collections::HashSet;
use std::sync::Arc;

use wfsched::errors::SchedError;
use wfsched::sched::{FailureOutcome, GreedyQueue, Progress, Scheduler, TaskState};
use wfsched::types::{Container, ContainerStatus};

fn greedy(retry_budget: u32) -> Scheduler {
    Scheduler::new(Box::new(GreedyQueue::new()), retry_budget)
}

fn container(n: u32) -> Container {
    Container::new(format!("container_{n}"), "h1")
}

#[test]
fn first_container_gets_head_of_queue() {
    init_tracing();
    let scheduler = greedy(2);
    assert_eq!(scheduler.add_tasks(ready_tasks(1, 3, 0)).unwrap(), 3);
    assert_eq!(scheduler.pending_node_requests(), 3);

    let task = scheduler.assign(&container(1)).unwrap();
    assert_eq!(task.id, 1);
    assert_eq!(task.state, TaskState::Running);
    assert_eq!(task.tries, 1);

    assert_eq!(scheduler.ready_count(), 2);
    let progress = scheduler.progress();
    assert_eq!(progress.running, 1);
    assert_eq!(progress.remaining, 2);

    assert_eq!(scheduler.assign(&container(2)).unwrap().id, 2);
    assert_eq!(scheduler.assign(&container(3)).unwrap().id, 3);
}

#[test]
fn failure_with_budget_left_requeues_once() {
    init_tracing();
    let scheduler = greedy(2);
    scheduler.add_tasks(ready_tasks(1, 1, 0)).unwrap();
    scheduler.drain_node_requests();

    scheduler.assign(&container(1)).unwrap();
    let outcome = scheduler
        .failed(1, &ContainerStatus::new("container_1", 1))
        .unwrap();

    assert_eq!(outcome, FailureOutcome::Retrying { attempts: 1 });
    assert_eq!(scheduler.task_state(1), Some(TaskState::Ready));
    assert_eq!(scheduler.ready_count(), 1);
    assert!(scheduler.has_next_node_request());
    assert_eq!(scheduler.pending_node_requests(), 1);
    assert_eq!(scheduler.progress().running, 0);
    assert_eq!(scheduler.progress().remaining, 1);

    let retried = scheduler.assign(&container(2)).unwrap();
    assert_eq!(retried.id, 1);
    assert_eq!(retried.tries, 2);
}

#[test]
fn failure_at_budget_aborts() {
    init_tracing();
    let scheduler = greedy(2);
    scheduler.add_tasks(ready_tasks(1, 1, 0)).unwrap();
    scheduler.drain_node_requests();

    scheduler.assign(&container(1)).unwrap();
    scheduler
        .failed(1, &ContainerStatus::new("container_1", 1))
        .unwrap();
    scheduler.next_node_request().unwrap();
    scheduler.assign(&container(2)).unwrap();

    let outcome = scheduler
        .failed(1, &ContainerStatus::new("container_2", 1))
        .unwrap();

    assert_eq!(outcome, FailureOutcome::RetryExhausted { attempts: 2 });
    assert_eq!(scheduler.task_state(1), Some(TaskState::Aborted));
    assert!(!scheduler.has_next_node_request());
    assert_eq!(scheduler.ready_count(), 0);
    assert_eq!(scheduler.aborted_tasks(), vec![1]);
    assert_eq!(
        scheduler.progress(),
        Progress {
            finished: 0,
            running: 0,
            remaining: 0,
            previously_finished: 0,
            aborted: 1,
        }
    );
}

#[test]
fn retry_budget_of_one_never_retries() {
    init_tracing();
    let scheduler = greedy(1);
    scheduler.add_tasks(ready_tasks(1, 1, 0)).unwrap();
    scheduler.assign(&container(1)).unwrap();

    assert_eq!(
        scheduler
            .failed(1, &ContainerStatus::new("container_1", 2))
            .unwrap(),
        FailureOutcome::RetryExhausted { attempts: 1 }
    );
}

#[test]
fn completion_moves_counters_and_releases_nothing() {
    init_tracing();
    let scheduler = greedy(2);
    scheduler.add_tasks(ready_tasks(1, 2, 0)).unwrap();
    scheduler.assign(&container(1)).unwrap();

    let release = scheduler
        .completed(1, &ContainerStatus::new("container_1", 0), 420)
        .unwrap();

    assert!(release.is_empty());
    assert_eq!(scheduler.task_state(1), Some(TaskState::Completed));
    assert_eq!(scheduler.running_task("container_1"), None);
    let progress = scheduler.progress();
    assert_eq!(progress.finished, 1);
    assert_eq!(progress.running, 0);
    assert_eq!(progress.remaining, 1);
    assert_eq!(progress.total(), 2);
}

#[test]
fn carried_over_tasks_are_excluded_from_totals() {
    init_tracing();
    let scheduler = greedy(2);
    scheduler.carry_over_finished(5);
    scheduler.add_tasks(ready_tasks(1, 2, 0)).unwrap();
    scheduler.assign(&container(1)).unwrap();
    scheduler
        .completed(1, &ContainerStatus::new("container_1", 0), 10)
        .unwrap();

    let progress = scheduler.progress();
    assert_eq!(progress.finished, 6);
    assert_eq!(progress.previously_finished, 5);
    assert_eq!(progress.finished_this_run(), 1);
    assert_eq!(progress.total(), 2);
}

#[test]
fn not_ready_tasks_wait_for_mark_ready() {
    init_tracing();
    let scheduler = greedy(2);
    let admitted = scheduler
        .add_tasks([
            TaskBuilder::new(1).ready().build(),
            TaskBuilder::new(2).parent(1).build(),
        ])
        .unwrap();

    assert_eq!(admitted, 1);
    assert_eq!(scheduler.pending_node_requests(), 1);
    assert_eq!(scheduler.progress().remaining, 2);

    scheduler.mark_ready(2).unwrap();
    assert_eq!(scheduler.pending_node_requests(), 2);
    assert_eq!(scheduler.ready_count(), 2);

    assert!(matches!(
        scheduler.mark_ready(2),
        Err(SchedError::InvariantViolation(_))
    ));
    assert!(matches!(
        scheduler.mark_ready(99),
        Err(SchedError::UnknownTask(99))
    ));
}

#[test]
fn empty_queues_are_reported() {
    init_tracing();
    let scheduler = greedy(2);

    assert!(!scheduler.has_next_node_request());
    assert!(matches!(
        scheduler.next_node_request(),
        Err(SchedError::EmptyQueue(_))
    ));
    assert!(matches!(
        scheduler.assign(&container(1)),
        Err(SchedError::EmptyQueue(_))
    ));
    assert!(scheduler.is_idle());
}

#[test]
fn bookkeeping_violations_are_rejected() {
    init_tracing();
    let scheduler = greedy(2);
    scheduler.add_tasks(ready_tasks(1, 2, 0)).unwrap();

    // Duplicate id.
    assert!(matches!(
        scheduler.add_tasks(ready_tasks(1, 1, 0)),
        Err(SchedError::InvariantViolation(_))
    ));
    // Tasks must enter as not-ready or ready.
    assert!(matches!(
        scheduler.add_tasks([TaskBuilder::new(7).state(TaskState::Running).build()]),
        Err(SchedError::InvariantViolation(_))
    ));

    scheduler.assign(&container(1)).unwrap();
    // Same container twice.
    assert!(matches!(
        scheduler.assign(&container(1)),
        Err(SchedError::InvariantViolation(_))
    ));
    // Completion reported for the wrong container.
    assert!(matches!(
        scheduler.completed(1, &ContainerStatus::new("container_9", 0), 1),
        Err(SchedError::InvariantViolation(_))
    ));
    // Task 2 is ready, not running.
    assert!(matches!(
        scheduler.failed(2, &ContainerStatus::new("container_1", 1)),
        Err(SchedError::InvariantViolation(_))
    ));
    assert_eq!(scheduler.progress().running, 1);
}

#[test]
fn state_machine_allows_only_documented_edges() {
    use TaskState::*;
    let all = [NotReady, Ready, Running, Completed, Failed, Aborted];
    let allowed: HashSet<(TaskState, TaskState)> = [
        (NotReady, Ready),
        (Ready, Running),
        (Running, Completed),
        (Running, Failed),
        (Failed, Ready),
        (Failed, Aborted),
    ]
    .into_iter()
    .collect();

    for from in all {
        for to in all {
            assert_eq!(
                from.can_transition_to(to),
                allowed.contains(&(from, to)),
                "{from} -> {to}"
            );
        }
    }
    assert!(Completed.is_terminal());
    assert!(Aborted.is_terminal());
    assert!(!Failed.is_terminal());
}

#[test]
fn concurrent_assignments_never_share_a_task() {
    init_tracing();
    let scheduler = Arc::new(greedy(3));
    scheduler.add_tasks(ready_tasks(1, 64, 0)).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let scheduler = Arc::clone(&scheduler);
            std::thread::spawn(move || {
                let mut assigned = Vec::new();
                for n in 0..8 {
                    let container = Container::new(format!("w{worker}-{n}"), "h1");
                    let task = scheduler.assign(&container).unwrap();
                    scheduler
                        .completed(task.id, &ContainerStatus::new(container.id.clone(), 0), 1)
                        .unwrap();
                    assigned.push(task.id);
                }
                assigned
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id), "task {id} assigned twice");
        }
    }
    assert_eq!(seen.len(), 64);
    assert_eq!(scheduler.progress().finished, 64);
    assert_eq!(scheduler.progress().remaining, 0);
}

#[test]
fn try_assign_returns_none_when_nothing_is_ready() {
    init_tracing();
    let scheduler = greedy(1);
    assert_eq!(scheduler.try_assign(&container(1)).unwrap(), None);

    scheduler.add_tasks(ready_tasks(1, 1, 0)).unwrap();
    let task = scheduler.try_assign(&container(2)).unwrap().unwrap();
    assert_eq!(task.id, 1);
    assert_eq!(scheduler.try_assign(&container(3)).unwrap(), None);
    assert_eq!(scheduler.progress().running, 1);
}

#[test]
fn concurrent_grants_never_race_for_the_last_task() {
    init_tracing();
    let scheduler = Arc::new(greedy(1));
    scheduler.add_tasks(ready_tasks(1, 4, 0)).unwrap();

    let assigned: Vec<Option<u64>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|n| {
                let scheduler = Arc::clone(&scheduler);
                s.spawn(move || {
                    scheduler
                        .try_assign(&container(n))
                        .unwrap()
                        .map(|task| task.id)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let ids: HashSet<u64> = assigned.iter().flatten().copied().collect();
    assert_eq!(ids, HashSet::from([1, 2, 3, 4]));
    assert_eq!(assigned.iter().filter(|a| a.is_none()).count(), 12);
    assert_eq!(scheduler.progress().running, 4);
    assert_eq!(scheduler.progress().remaining, 0);
}
