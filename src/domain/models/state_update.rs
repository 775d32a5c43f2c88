//! `StateUpdate`: the immutable message every service produces and
//! [`crate::domain::models::state::SwarmState::apply_update`] consumes.

use std::collections::HashMap;

use super::ids::{ArrayId, TaskId};
use super::status::{TaskStatus, WorkflowRunStatus};

/// Any field may be empty/absent — a service only populates what it
/// actually learned this tick. Applying an empty update is a no-op
/// (spec §5 "Idempotence").
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub task_statuses: HashMap<TaskId, TaskStatus>,
    pub workflow_run_status: Option<WorkflowRunStatus>,
    pub sync_time: Option<String>,
    pub max_concurrently_running: Option<u32>,
    pub array_limits: HashMap<ArrayId, u32>,
}

impl StateUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.task_statuses.is_empty()
            && self.workflow_run_status.is_none()
            && self.sync_time.is_none()
            && self.max_concurrently_running.is_none()
            && self.array_limits.is_empty()
    }

    /// Merge `other` into `self`. Later values win on scalar fields;
    /// maps are combined key-wise with `other` taking precedence on
    /// overlapping keys. Used by the Scheduler to fold per-batch
    /// `queue_task_batch` responses into one update for the tick.
    pub fn merge(&mut self, other: Self) {
        self.task_statuses.extend(other.task_statuses);
        if other.workflow_run_status.is_some() {
            self.workflow_run_status = other.workflow_run_status;
        }
        if other.sync_time.is_some() {
            self.sync_time = other.sync_time;
        }
        if other.max_concurrently_running.is_some() {
            self.max_concurrently_running = other.max_concurrently_running;
        }
        self.array_limits.extend(other.array_limits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_update_is_empty() {
        assert!(StateUpdate::default().is_empty());
    }

    #[test]
    fn merge_combines_task_statuses() {
        let mut a = StateUpdate::default();
        a.task_statuses.insert(TaskId(1), TaskStatus::Queued);
        let mut b = StateUpdate::default();
        b.task_statuses.insert(TaskId(2), TaskStatus::Queued);
        a.merge(b);
        assert_eq!(a.task_statuses.len(), 2);
    }

    #[test]
    fn merge_lets_later_scalar_win() {
        let mut a = StateUpdate::default();
        a.sync_time = Some("t1".to_string());
        let mut b = StateUpdate::default();
        b.sync_time = Some("t2".to_string());
        a.merge(b);
        assert_eq!(a.sync_time, Some("t2".to_string()));
    }
}
