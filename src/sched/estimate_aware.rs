// src/sched/estimate_aware.rs

use tracing::debug;

use crate::errors::{Result, SchedError};
use crate::estimate::EstimatorState;
use crate::sched::policy::AssignmentPolicy;
use crate::sched::task::TaskInstance;
use crate::types::{Container, TaskId, TaskTypeId};

/// Gives each container the ready task whose type has the lowest estimated
/// runtime on the container's host.
///
/// Task types never observed on that host count as zero, so they get tried
/// early and start producing statistics. Ties go to the task that has waited
/// longest.
#[derive(Debug, Default)]
pub struct EstimateAwareQueue {
    queue: Vec<(TaskId, TaskTypeId)>,
}

impl EstimateAwareQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssignmentPolicy for EstimateAwareQueue {
    fn name(&self) -> &'static str {
        "estimate-aware"
    }

    fn enqueue(&mut self, task: &TaskInstance) {
        self.queue.push((task.id, task.task_type));
    }

    fn select_next(&mut self, container: &Container, estimates: &EstimatorState) -> Result<TaskId> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, &(_, task_type)) in self.queue.iter().enumerate() {
            let weight = estimates.weight(&container.host, task_type).unwrap_or(0.0);
            if best.is_none_or(|(_, w)| weight < w) {
                best = Some((idx, weight));
            }
        }

        let (idx, weight) = best.ok_or(SchedError::EmptyQueue("estimate-aware ready queue"))?;
        let (task, task_type) = self.queue.remove(idx);
        debug!(
            task,
            task_type,
            weight,
            container = %container,
            "estimate-aware queue picked fastest task type for host"
        );
        Ok(task)
    }

    fn ready_count(&self) -> usize {
        self.queue.len()
    }
}
