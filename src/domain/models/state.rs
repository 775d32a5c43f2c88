//! `SwarmState`: the in-memory model of the workflow-run (spec §3).
//!
//! `SwarmState` exclusively owns all [`SwarmTask`]s, [`SwarmArray`]s, and
//! cached [`TaskResources`]. Services never mutate it directly — they
//! return [`StateUpdate`] values that flow through [`SwarmState::apply_update`].

use std::collections::{HashMap, HashSet, VecDeque};

use super::array::SwarmArray;
use super::ids::{ArrayId, TaskId};
use super::resources::TaskResourcesCache;
use super::state_update::StateUpdate;
use super::status::{TaskStatus, WorkflowRunStatus};
use super::task::SwarmTask;

/// The ordered ready-queue. Duplicates are forbidden by policy: a task
/// already present is never re-enqueued (spec §3, §5 "ready_to_run
/// ordering"). A companion `HashSet` gives O(1) membership checks instead
/// of scanning the deque on every push.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    order: VecDeque<TaskId>,
    member: HashSet<TaskId>,
}

impl ReadyQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue at the back. No-op if `task_id` is already queued.
    pub fn push_back(&mut self, task_id: TaskId) {
        if self.member.insert(task_id) {
            self.order.push_back(task_id);
        }
    }

    /// Enqueue at the front (used for `ADJUSTING_RESOURCES` tasks and for
    /// restoring unschedulable/popped-but-not-queued tasks; spec §4.4,
    /// §4.5). No-op if `task_id` is already queued.
    pub fn push_front(&mut self, task_id: TaskId) {
        if self.member.insert(task_id) {
            self.order.push_front(task_id);
        }
    }

    pub fn pop_front(&mut self) -> Option<TaskId> {
        let task_id = self.order.pop_front()?;
        self.member.remove(&task_id);
        Some(task_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn contains(&self, task_id: TaskId) -> bool {
        self.member.contains(&task_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskId> {
        self.order.iter()
    }
}

/// Aggregate root for one workflow run.
pub struct SwarmState {
    pub workflow_run_id: i64,
    pub workflow_id: i64,
    pub status: WorkflowRunStatus,
    pub tasks: HashMap<TaskId, SwarmTask>,
    pub arrays: HashMap<ArrayId, SwarmArray>,
    pub task_status_map: HashMap<TaskStatus, HashSet<TaskId>>,
    pub ready_to_run: ReadyQueue,
    pub task_resources_cache: TaskResourcesCache,
    pub last_sync: Option<String>,
    pub max_concurrently_running: u32,
    pub num_previously_complete: u32,
    /// Test hook counter, incremented only on DONE propagation (spec §4.5,
    /// §9 "Open questions" / SPEC_FULL §5.1).
    pub n_executions: u64,
}

impl SwarmState {
    #[must_use]
    pub fn new(workflow_run_id: i64, workflow_id: i64, max_concurrently_running: u32) -> Self {
        let mut task_status_map = HashMap::new();
        for status in TaskStatus::ALL {
            task_status_map.insert(status, HashSet::new());
        }
        Self {
            workflow_run_id,
            workflow_id,
            status: WorkflowRunStatus::Bound,
            tasks: HashMap::new(),
            arrays: HashMap::new(),
            task_status_map,
            ready_to_run: ReadyQueue::new(),
            task_resources_cache: TaskResourcesCache::new(),
            last_sync: None,
            max_concurrently_running,
            num_previously_complete: 0,
            n_executions: 0,
        }
    }

    /// Insert a task built during the build step, bucketing it by status.
    pub fn insert_task(&mut self, task: SwarmTask) {
        let status = task.status;
        let task_id = task.task_id;
        self.task_status_map.entry(status).or_default().insert(task_id);
        self.tasks.insert(task_id, task);
    }

    pub fn insert_array(&mut self, array: SwarmArray) {
        self.arrays.insert(array.array_id, array);
    }

    /// `Σ |task_status_map[s]|` over the active set `{Q, I, O, R}`.
    #[must_use]
    pub fn active_count(&self) -> usize {
        TaskStatus::ALL
            .iter()
            .filter(|s| s.is_active())
            .map(|s| self.task_status_map.get(s).map_or(0, HashSet::len))
            .sum()
    }

    #[must_use]
    pub fn active_count_in_array(&self, array_id: ArrayId) -> usize {
        TaskStatus::ALL
            .iter()
            .filter(|s| s.is_active())
            .map(|s| {
                self.task_status_map.get(s).map_or(0, |ids| {
                    ids.iter()
                        .filter(|id| {
                            self.tasks
                                .get(id)
                                .is_some_and(|t| t.array_id == array_id)
                        })
                        .count()
                })
            })
            .sum()
    }

    #[must_use]
    pub fn done_count(&self) -> usize {
        self.task_status_map
            .get(&TaskStatus::Done)
            .map_or(0, HashSet::len)
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.task_status_map
            .get(&TaskStatus::ErrorFatal)
            .map_or(0, HashSet::len)
    }

    #[must_use]
    pub fn all_tasks_final(&self) -> bool {
        self.done_count() + self.failed_count() == self.tasks.len()
    }

    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        self.active_count() > 0 || !self.ready_to_run.is_empty()
    }

    /// Apply a [`StateUpdate`], returning the set of tasks whose status
    /// *actually changed* so the caller can run DAG propagation (spec §3,
    /// §5 "Propagation soundness"). Idempotent: re-applying the same
    /// update after it has already taken effect returns an empty set.
    pub fn apply_update(&mut self, update: &StateUpdate) -> HashSet<TaskId> {
        let mut changed = HashSet::new();

        for (&task_id, &new_status) in &update.task_statuses {
            let Some(task) = self.tasks.get_mut(&task_id) else {
                continue;
            };
            if task.status == new_status {
                continue;
            }
            let old_status = task.status;
            if let Some(bucket) = self.task_status_map.get_mut(&old_status) {
                bucket.remove(&task_id);
            }
            task.status = new_status;
            self.task_status_map.entry(new_status).or_default().insert(task_id);
            changed.insert(task_id);
        }

        if let Some(status) = update.workflow_run_status {
            self.status = status;
        }
        if let Some(ref sync_time) = update.sync_time {
            self.last_sync = Some(sync_time.clone());
        }
        if let Some(max) = update.max_concurrently_running {
            self.max_concurrently_running = max;
        }
        for (&array_id, &limit) in &update.array_limits {
            if let Some(array) = self.arrays.get_mut(&array_id) {
                array.max_concurrently_running = limit;
            }
        }

        changed
    }
}
