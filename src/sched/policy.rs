// src/sched/policy.rs

//! Pluggable assignment policies.
//!
//! The scheduler owns bookkeeping; a policy only decides which ready task a
//! freshly granted container should run.

use std::fmt::Debug;

use crate::errors::Result;
use crate::estimate::EstimatorState;
use crate::sched::estimate_aware::EstimateAwareQueue;
use crate::sched::greedy::GreedyQueue;
use crate::sched::task::TaskInstance;
use crate::types::{Container, PolicyKind, TaskId};

pub trait AssignmentPolicy: Send + Debug {
    fn name(&self) -> &'static str;

    /// Admit a task that just became ready. Called exactly once per
    /// transition to ready, including after a retry.
    fn enqueue(&mut self, task: &TaskInstance);

    /// Remove and return the task `container` should run.
    ///
    /// Fails with [`crate::errors::SchedError::EmptyQueue`] when nothing is
    /// ready.
    fn select_next(&mut self, container: &Container, estimates: &EstimatorState) -> Result<TaskId>;

    /// Number of tasks waiting for a container.
    fn ready_count(&self) -> usize;
}

/// Construct the policy named in config.
pub fn policy_for(kind: PolicyKind) -> Box<dyn AssignmentPolicy> {
    match kind {
        PolicyKind::GreedyQueue => Box::new(GreedyQueue::new()),
        PolicyKind::EstimateAware => Box::new(EstimateAwareQueue::new()),
    }
}
