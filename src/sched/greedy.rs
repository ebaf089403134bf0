// src/sched/greedy.rs

use std::collections::VecDeque;

use tracing::debug;

use crate::errors::{Result, SchedError};
use crate::estimate::EstimatorState;
use crate::sched::policy::AssignmentPolicy;
use crate::sched::task::TaskInstance;
use crate::types::{Container, TaskId};

/// Ready tasks in arrival order; every container gets the head of the queue.
///
/// No host awareness and no estimates. This is the baseline other policies
/// are compared against.
#[derive(Debug, Default)]
pub struct GreedyQueue {
    queue: VecDeque<TaskId>,
}

impl GreedyQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssignmentPolicy for GreedyQueue {
    fn name(&self) -> &'static str {
        "greedy-queue"
    }

    fn enqueue(&mut self, task: &TaskInstance) {
        self.queue.push_back(task.id);
        debug!(task = %task, queued = self.queue.len(), "added task to queue");
    }

    fn select_next(&mut self, container: &Container, _estimates: &EstimatorState) -> Result<TaskId> {
        let task = self
            .queue
            .pop_front()
            .ok_or(SchedError::EmptyQueue("greedy ready queue"))?;
        debug!(task, container = %container, "greedy queue picked head");
        Ok(task)
    }

    fn ready_count(&self) -> usize {
        self.queue.len()
    }
}
