// src/sched/mod.rs

//! Task lifecycle and container assignment.

pub mod estimate_aware;
pub mod greedy;
pub mod policy;
pub mod scheduler;
pub mod task;

pub use estimate_aware::EstimateAwareQueue;
pub use greedy::GreedyQueue;
pub use policy::{AssignmentPolicy, policy_for};
pub use scheduler::{Progress, Scheduler};
pub use task::{FailureOutcome, TaskInstance, TaskState};
