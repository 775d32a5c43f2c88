//! `SwarmTask`: a single unit of work inside a workflow run.

use std::collections::HashSet;
use std::sync::Arc;

use super::ids::{ArrayId, ClusterId, QueueId, TaskId};
use super::resources::{ResourceScale, TaskResources};
use super::status::TaskStatus;

/// A zero-arg callable returning resource overrides, consumed at-most-once
/// at validation time (spec §3, §9 "Dynamic `compute_resources_callable`").
///
/// Represented as a boxed `Fn` rather than a `FnOnce` because `SwarmTask`
/// needs to hold it behind a field that can be taken (`Option::take`);
/// the "at-most-once" invariant is enforced at the call site by clearing
/// the field after the first call, not by the type system.
pub type ComputeResourcesCallable = Arc<dyn Fn() -> Option<ResourceMapOverride> + Send + Sync>;

/// The mapping a [`ComputeResourcesCallable`] returns. A `None` return
/// from the callable itself is fine (means "no override"); an `Err` means
/// the callable produced something that isn't a resource mapping, which
/// is the "callable returned invalid object" error case from spec §4.5/§7.
/// Modeled here as `Option<ResourceMap>` at the callable boundary and
/// surfaced as [`crate::domain::error::ResourceError`] by the caller when
/// the callable signals failure via [`ResourceMapOverride::Invalid`].
#[derive(Debug, Clone)]
pub enum ResourceMapOverride {
    Map(super::resources::ResourceMap),
    Invalid,
}

/// A single unit of work inside a workflow run.
#[derive(Clone)]
pub struct SwarmTask {
    pub task_id: TaskId,
    pub array_id: ArrayId,
    pub status: TaskStatus,
    pub num_upstreams: u32,
    pub num_upstreams_done: u32,
    /// Forward edges only, stored as ids rather than references (spec §9).
    pub downstream_swarm_tasks: HashSet<TaskId>,
    pub max_attempts: u32,
    pub current_task_resources: TaskResources,
    pub compute_resources_callable: Option<ComputeResourcesCallable>,
    pub resource_scales: std::collections::HashMap<String, ResourceScale>,
    pub fallback_queues: Vec<QueueId>,
    pub cluster: ClusterId,
    /// Number of times this task has gone through `ADJUSTING_RESOURCES`;
    /// indexes into a `ResourceScale::Sequence` (spec §3 `resource_scales`
    /// "finite sequence of factors").
    pub adjustment_attempts: usize,
}

impl SwarmTask {
    #[must_use]
    pub fn new(
        task_id: TaskId,
        array_id: ArrayId,
        cluster: ClusterId,
        current_task_resources: TaskResources,
    ) -> Self {
        Self {
            task_id,
            array_id,
            status: TaskStatus::Registering,
            num_upstreams: 0,
            num_upstreams_done: 0,
            downstream_swarm_tasks: HashSet::new(),
            max_attempts: 3,
            current_task_resources,
            compute_resources_callable: None,
            resource_scales: std::collections::HashMap::new(),
            fallback_queues: Vec::new(),
            cluster,
            adjustment_attempts: 0,
        }
    }

    /// `0 ≤ num_upstreams_done ≤ num_upstreams` ∧
    /// `all_upstreams_done ⇔ num_upstreams_done == num_upstreams` (spec §3).
    #[must_use]
    pub const fn all_upstreams_done(&self) -> bool {
        self.num_upstreams_done == self.num_upstreams
    }

    /// Record one more completed upstream. Capped at `num_upstreams` so a
    /// duplicated propagation (spec §8 "Propagation soundness") can never
    /// push the count past the invariant.
    pub fn record_upstream_done(&mut self) {
        if self.num_upstreams_done < self.num_upstreams {
            self.num_upstreams_done += 1;
        }
    }

    /// Once `status ∈ {DONE, ERROR_FATAL}` the task is terminal for this
    /// run and may not transition further locally (spec §3).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl std::fmt::Debug for SwarmTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwarmTask")
            .field("task_id", &self.task_id)
            .field("array_id", &self.array_id)
            .field("status", &self.status)
            .field("num_upstreams", &self.num_upstreams)
            .field("num_upstreams_done", &self.num_upstreams_done)
            .field("downstream_swarm_tasks", &self.downstream_swarm_tasks)
            .field("adjustment_attempts", &self.adjustment_attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::resources::ResourceMap;

    fn make_task(id: i64) -> SwarmTask {
        SwarmTask::new(
            TaskId(id),
            ArrayId(1),
            ClusterId(1),
            TaskResources::new(ResourceMap::new(), QueueId(1)),
        )
    }

    #[test]
    fn all_upstreams_done_matches_invariant() {
        let mut task = make_task(1);
        task.num_upstreams = 2;
        assert!(!task.all_upstreams_done());
        task.record_upstream_done();
        assert!(!task.all_upstreams_done());
        task.record_upstream_done();
        assert!(task.all_upstreams_done());
    }

    #[test]
    fn record_upstream_done_never_exceeds_total() {
        let mut task = make_task(1);
        task.num_upstreams = 1;
        task.record_upstream_done();
        task.record_upstream_done();
        assert_eq!(task.num_upstreams_done, 1);
    }

    #[test]
    fn terminal_statuses_are_recognized() {
        let mut task = make_task(1);
        task.status = TaskStatus::Done;
        assert!(task.is_terminal());
        task.status = TaskStatus::ErrorFatal;
        assert!(task.is_terminal());
        task.status = TaskStatus::Running;
        assert!(!task.is_terminal());
    }
}
