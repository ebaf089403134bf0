// src/sched/scheduler.rs

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::errors::{Result, SchedError};
use crate::estimate::{EstimatorState, RuntimeEstimator};
use crate::sched::policy::AssignmentPolicy;
use crate::sched::task::{FailureOutcome, TaskInstance, TaskState};
use crate::types::{Container, ContainerId, ContainerStatus, NodeRequest, TaskId};

/// Progress counters for status reporting.
///
/// `finished` includes tasks carried over from a resumed earlier run;
/// [`Progress::finished_this_run`] and [`Progress::total`] exclude them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub finished: u64,
    pub running: u64,
    pub remaining: u64,
    pub previously_finished: u64,
    pub aborted: u64,
}

impl Progress {
    pub fn finished_this_run(&self) -> u64 {
        self.finished - self.previously_finished
    }

    pub fn total(&self) -> u64 {
        self.finished_this_run() + self.running + self.remaining
    }
}

/// All mutable scheduler state. Only ever touched under the scheduler lock.
#[derive(Debug)]
struct SchedulerState {
    tasks: HashMap<TaskId, TaskInstance>,
    policy: Box<dyn AssignmentPolicy>,
    node_requests: VecDeque<NodeRequest>,
    running: HashMap<ContainerId, TaskId>,
    progress: Progress,
    aborted: Vec<TaskId>,
}

impl SchedulerState {
    fn task_mut(&mut self, id: TaskId) -> Result<&mut TaskInstance> {
        self.tasks.get_mut(&id).ok_or(SchedError::UnknownTask(id))
    }

    /// A task just became ready: one node request plus one policy admission.
    fn admit(&mut self, id: TaskId) -> Result<()> {
        let task = self.tasks.get(&id).ok_or(SchedError::UnknownTask(id))?;
        self.policy.enqueue(task);
        self.node_requests.push_back(NodeRequest);
        Ok(())
    }

    /// Detach `task` from the container it ran in, checking both sides agree.
    fn release_running(&mut self, task: TaskId, container: &ContainerId) -> Result<()> {
        match self.running.get(container) {
            Some(&running) if running == task => {
                self.running.remove(container);
            }
            Some(&running) => {
                return Err(SchedError::InvariantViolation(format!(
                    "container {container} runs task {running}, not {task}"
                )));
            }
            None => {
                return Err(SchedError::InvariantViolation(format!(
                    "container {container} has no running task (reported for task {task})"
                )));
            }
        }

        self.progress.running = self.progress.running.checked_sub(1).ok_or_else(|| {
            SchedError::InvariantViolation("running counter underflow".to_string())
        })?;
        Ok(())
    }
}

/// Task lifecycle bookkeeping around a pluggable [`AssignmentPolicy`].
///
/// Every operation takes `&self` and runs end to end under one mutex, so the
/// scheduler can be shared between resource-manager and node-manager callback
/// contexts through an `Arc`.
#[derive(Debug)]
pub struct Scheduler {
    inner: Mutex<SchedulerState>,
    estimator: Option<Arc<RuntimeEstimator>>,
    retry_budget: u32,
}

impl Scheduler {
    /// `retry_budget` is the maximum number of attempts per task, including
    /// the first.
    pub fn new(policy: Box<dyn AssignmentPolicy>, retry_budget: u32) -> Self {
        Self {
            inner: Mutex::new(SchedulerState {
                tasks: HashMap::new(),
                policy,
                node_requests: VecDeque::new(),
                running: HashMap::new(),
                progress: Progress::default(),
                aborted: Vec::new(),
            }),
            estimator: None,
            retry_budget,
        }
    }

    /// Let the policy consult runtime estimates.
    pub fn with_estimator(mut self, estimator: Arc<RuntimeEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record tasks finished by an earlier run this one resumes.
    pub fn carry_over_finished(&self, count: u64) {
        let mut state = self.lock();
        state.progress.finished += count;
        state.progress.previously_finished += count;
        info!(count, "carried over finished tasks from previous run");
    }

    /// Register tasks. Each one counts as remaining; those already ready get
    /// a node request and are admitted to the policy.
    ///
    /// Returns how many tasks were admitted as ready.
    pub fn add_tasks(&self, tasks: impl IntoIterator<Item = TaskInstance>) -> Result<usize> {
        let mut state = self.lock();
        let mut admitted = 0;

        for task in tasks {
            if state.tasks.contains_key(&task.id) {
                return Err(SchedError::InvariantViolation(format!(
                    "task {} added twice",
                    task.id
                )));
            }
            if !matches!(task.state, TaskState::NotReady | TaskState::Ready) {
                return Err(SchedError::InvariantViolation(format!(
                    "task {} added in state {}",
                    task.id, task.state
                )));
            }

            let id = task.id;
            let ready = task.is_ready();
            debug!(task = %task, state = %task.state, "adding task");
            state.tasks.insert(id, task);
            state.progress.remaining += 1;

            if ready {
                state.admit(id)?;
                admitted += 1;
            }
        }

        Ok(admitted)
    }

    /// A task's dependencies are now satisfied.
    pub fn mark_ready(&self, id: TaskId) -> Result<()> {
        let mut state = self.lock();
        let task = state.task_mut(id)?;
        task.transition(TaskState::Ready)?;
        debug!(task = %task, "task became ready");
        state.admit(id)
    }

    pub fn has_next_node_request(&self) -> bool {
        !self.lock().node_requests.is_empty()
    }

    pub fn pending_node_requests(&self) -> usize {
        self.lock().node_requests.len()
    }

    /// Take one pending node request.
    pub fn next_node_request(&self) -> Result<NodeRequest> {
        self.lock()
            .node_requests
            .pop_front()
            .ok_or(SchedError::EmptyQueue("node requests"))
    }

    /// Take all pending node requests at once.
    pub fn drain_node_requests(&self) -> Vec<NodeRequest> {
        self.lock().node_requests.drain(..).collect()
    }

    fn estimates(&self) -> Arc<EstimatorState> {
        match &self.estimator {
            Some(estimator) => estimator.snapshot(),
            None => Arc::new(EstimatorState::default()),
        }
    }

    /// Pick a ready task for `container` and mark it running.
    ///
    /// Fails with [`SchedError::EmptyQueue`] if nothing is ready.
    pub fn assign(&self, container: &Container) -> Result<TaskInstance> {
        let estimates = self.estimates();
        let mut state = self.lock();
        Self::assign_locked(&mut state, container, &estimates)
    }

    /// Like [`Scheduler::assign`], but returns `None` when nothing is ready.
    /// The check and the assignment happen under one lock, so a concurrent
    /// caller cannot take the last ready task in between.
    pub fn try_assign(&self, container: &Container) -> Result<Option<TaskInstance>> {
        let estimates = self.estimates();
        let mut state = self.lock();
        if state.policy.ready_count() == 0 {
            return Ok(None);
        }
        Self::assign_locked(&mut state, container, &estimates).map(Some)
    }

    fn assign_locked(
        state: &mut SchedulerState,
        container: &Container,
        estimates: &EstimatorState,
    ) -> Result<TaskInstance> {
        if let Some(existing) = state.running.get(&container.id) {
            return Err(SchedError::InvariantViolation(format!(
                "container {} already runs task {existing}",
                container.id
            )));
        }

        let id = state.policy.select_next(container, estimates)?;
        let task = state.task_mut(id)?;
        if !task.is_ready() {
            return Err(SchedError::InvariantViolation(format!(
                "policy selected task {} in state {}",
                task.id, task.state
            )));
        }
        task.transition(TaskState::Running)?;
        task.tries += 1;
        let assigned = task.clone();

        state.running.insert(container.id.clone(), id);
        state.progress.remaining = state.progress.remaining.checked_sub(1).ok_or_else(|| {
            SchedError::InvariantViolation("remaining counter underflow".to_string())
        })?;
        state.progress.running += 1;

        info!(
            task = %assigned,
            attempt = assigned.tries,
            container = %container,
            "assigned task to container"
        );

        Ok(assigned)
    }

    /// The task running in `status.container_id` finished successfully.
    ///
    /// Returns containers the policy wants released early; the built-in
    /// policies never ask for any.
    pub fn completed(
        &self,
        id: TaskId,
        status: &ContainerStatus,
        runtime_ms: u64,
    ) -> Result<Vec<ContainerId>> {
        let mut state = self.lock();
        state.release_running(id, &status.container_id)?;

        let task = state.task_mut(id)?;
        task.transition(TaskState::Completed)?;
        info!(
            task = %task,
            container = %status.container_id,
            runtime_ms,
            "task finished"
        );

        state.progress.finished += 1;
        Ok(Vec::new())
    }

    /// The task running in `status.container_id` failed.
    ///
    /// Retries while attempts stay below the retry budget; otherwise the task
    /// is aborted for good.
    pub fn failed(&self, id: TaskId, status: &ContainerStatus) -> Result<FailureOutcome> {
        let retry_budget = self.retry_budget;
        let mut state = self.lock();
        state.release_running(id, &status.container_id)?;

        let task = state.task_mut(id)?;
        task.transition(TaskState::Failed)?;
        let attempts = task.tries;
        warn!(
            task = %task,
            container = %status.container_id,
            exit_code = status.exit_code,
            attempts,
            "task failed"
        );

        if attempts < retry_budget {
            task.transition(TaskState::Ready)?;
            info!(task = %task, attempts, retry_budget, "retrying task");
            state.progress.remaining += 1;
            state.admit(id)?;
            Ok(FailureOutcome::Retrying { attempts })
        } else {
            task.transition(TaskState::Aborted)?;
            warn!(
                task = %task,
                attempts,
                "task exceeded its retry budget; aborting"
            );
            state.progress.aborted += 1;
            state.aborted.push(id);
            Ok(FailureOutcome::RetryExhausted { attempts })
        }
    }

    /// Task currently running in `container`, if any.
    pub fn running_task(&self, container: &str) -> Option<TaskId> {
        self.lock().running.get(container).copied()
    }

    pub fn task(&self, id: TaskId) -> Option<TaskInstance> {
        self.lock().tasks.get(&id).cloned()
    }

    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.lock().tasks.get(&id).map(|t| t.state)
    }

    pub fn ready_count(&self) -> usize {
        self.lock().policy.ready_count()
    }

    /// Nothing ready and nothing running.
    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.policy.ready_count() == 0 && state.progress.running == 0
    }

    pub fn progress(&self) -> Progress {
        self.lock().progress
    }

    pub fn aborted_tasks(&self) -> Vec<TaskId> {
        self.lock().aborted.clone()
    }

    pub fn policy_name(&self) -> &'static str {
        self.lock().policy.name()
    }
}
