use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use wfsched::engine::ClusterEvent;
use wfsched::engine::backend::{BackendFuture, ClusterBackend};
use wfsched::errors::SchedError;
use wfsched::sched::TaskInstance;
use wfsched::types::{Container, ContainerId, ContainerStatus, NodeRequest, TaskId};

/// Everything the fake cluster was asked to do.
#[derive(Debug, Clone, Default)]
pub struct ClusterJournal {
    pub requested: usize,
    pub allocated: Vec<Container>,
    /// `(task, attempt, container)` in launch order.
    pub launches: Vec<(TaskId, u32, Container)>,
    pub released: Vec<ContainerId>,
    pub aborted: Vec<TaskId>,
}

impl ClusterJournal {
    pub fn launched_tasks(&self) -> Vec<TaskId> {
        self.launches.iter().map(|(task, _, _)| *task).collect()
    }
}

/// A simulated resource manager.
///
/// - every container request is granted immediately, on hosts in round-robin
///   order;
/// - every launch completes immediately with exit code 0, unless a failure
///   was scripted for that task.
///
/// Events go back into the runtime's own channel while the runtime awaits the
/// backend, so give that channel room for a whole burst of grants.
pub struct FakeCluster {
    events: mpsc::Sender<ClusterEvent>,
    hosts: Vec<String>,
    next_host: usize,
    next_container: u64,
    failures: HashMap<TaskId, u32>,
    launch_failures: HashMap<TaskId, u32>,
    runtime_ms: u64,
    journal: Arc<Mutex<ClusterJournal>>,
}

impl FakeCluster {
    pub fn new(events: mpsc::Sender<ClusterEvent>, hosts: &[&str]) -> Self {
        Self {
            events,
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            next_host: 0,
            next_container: 0,
            failures: HashMap::new(),
            launch_failures: HashMap::new(),
            runtime_ms: 100,
            journal: Arc::new(Mutex::new(ClusterJournal::default())),
        }
    }

    /// The first `attempts` launches of `task` exit with code 1.
    pub fn fail_task(mut self, task: TaskId, attempts: u32) -> Self {
        self.failures.insert(task, attempts);
        self
    }

    /// The first `attempts` launches of `task` never start.
    pub fn fail_launch(mut self, task: TaskId, attempts: u32) -> Self {
        self.launch_failures.insert(task, attempts);
        self
    }

    pub fn journal_handle(&self) -> Arc<Mutex<ClusterJournal>> {
        Arc::clone(&self.journal)
    }

    pub fn journal(&self) -> ClusterJournal {
        self.journal.lock().unwrap().clone()
    }

    fn next_container(&mut self) -> Container {
        let host = self.hosts[self.next_host % self.hosts.len()].clone();
        self.next_host += 1;
        self.next_container += 1;
        Container::new(format!("container_{:06}", self.next_container), host)
    }

    fn take_scripted(map: &mut HashMap<TaskId, u32>, task: TaskId) -> bool {
        match map.get_mut(&task) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

async fn send(tx: &mpsc::Sender<ClusterEvent>, event: ClusterEvent) -> Result<(), SchedError> {
    tx.send(event)
        .await
        .map_err(|e| SchedError::Other(anyhow::anyhow!("cluster event channel closed: {e}")))
}

impl ClusterBackend for FakeCluster {
    fn request_containers(&mut self, requests: Vec<NodeRequest>) -> BackendFuture<'_> {
        Box::pin(async move {
            for _ in requests {
                let container = self.next_container();
                {
                    let mut journal = self.journal.lock().unwrap();
                    journal.requested += 1;
                    journal.allocated.push(container.clone());
                }
                send(&self.events, ClusterEvent::ContainerAllocated(container)).await?;
            }
            Ok(())
        })
    }

    fn launch(&mut self, container: Container, task: TaskInstance) -> BackendFuture<'_> {
        Box::pin(async move {
            self.journal
                .lock()
                .unwrap()
                .launches
                .push((task.id, task.tries, container.clone()));

            let event = if Self::take_scripted(&mut self.launch_failures, task.id) {
                ClusterEvent::LaunchFailed {
                    container_id: container.id,
                    reason: "scripted launch failure".to_string(),
                }
            } else {
                let exit_code = if Self::take_scripted(&mut self.failures, task.id) {
                    1
                } else {
                    0
                };
                ClusterEvent::ContainerCompleted {
                    status: ContainerStatus::new(container.id, exit_code),
                    runtime_ms: self.runtime_ms,
                }
            };
            send(&self.events, event).await
        })
    }

    fn release(&mut self, containers: Vec<ContainerId>) -> BackendFuture<'_> {
        self.journal.lock().unwrap().released.extend(containers);
        Box::pin(async { Ok(()) })
    }

    fn task_aborted(&mut self, task: TaskId) -> BackendFuture<'_> {
        self.journal.lock().unwrap().aborted.push(task);
        Box::pin(async { Ok(()) })
    }
}
