//! Scheduler (spec §4.4): batches ready-to-run tasks under global and
//! per-array concurrency caps and dispatches them through the Gateway.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::domain::error::GatewayError;
use crate::domain::models::{ArrayId, StateUpdate, SwarmState, TaskId, TaskResources};
use crate::domain::ports::Gateway;

/// Hard cap on batch size (spec §4.4, §8 "Batch compatibility").
const MAX_BATCH_SIZE: usize = 500;

pub struct Scheduler<G: Gateway> {
    gateway: std::sync::Arc<G>,
}

impl<G: Gateway> Scheduler<G> {
    #[must_use]
    pub fn new(gateway: std::sync::Arc<G>) -> Self {
        Self { gateway }
    }

    /// Process ready-to-run work until the queue is empty, capacities are
    /// exhausted, or `elapsed ≥ timeout` (a negative timeout means
    /// unlimited). Mutates `state.ready_to_run` directly (popping and
    /// re-enqueueing is how this component expresses its work); task
    /// *status* changes only ever flow back through the returned
    /// [`StateUpdate`], never by writing `state.tasks` directly.
    pub async fn tick(&self, state: &mut SwarmState, timeout: Duration, unlimited: bool) -> StateUpdate {
        let started = Instant::now();
        let mut combined = StateUpdate::default();

        let mut workflow_capacity = i64::from(state.max_concurrently_running) - state.active_count() as i64;
        let mut array_capacity: HashMap<ArrayId, i64> = state
            .arrays
            .iter()
            .map(|(&id, array)| (id, i64::from(array.max_concurrently_running) - state.active_count_in_array(id) as i64))
            .collect();

        // Tasks popped this tick that turned out unschedulable at pop
        // time; restored to the front, in original relative order, on
        // every exit path (including cancellation/timeout).
        let mut unschedulable: Vec<TaskId> = Vec::new();

        loop {
            if state.ready_to_run.is_empty() {
                break;
            }
            if !unlimited && started.elapsed() >= timeout {
                break;
            }

            let Some(seed_id) = state.ready_to_run.pop_front() else {
                break;
            };
            let Some(seed) = state.tasks.get(&seed_id) else {
                continue; // task vanished (shouldn't happen under spec's invariants)
            };
            let seed_array = seed.array_id;
            let seed_resources = seed.current_task_resources.clone();

            let seed_schedulable = workflow_capacity > 0
                && array_capacity.get(&seed_array).copied().unwrap_or(0) > 0;

            if !seed_schedulable {
                unschedulable.push(seed_id);
                continue;
            }

            let mut batch: Vec<TaskId> = vec![seed_id];
            workflow_capacity -= 1;
            *array_capacity.entry(seed_array).or_insert(0) -= 1;

            // Examine up to |ready_to_run| further tasks from the front.
            let scan_count = state.ready_to_run.len();
            for _ in 0..scan_count {
                let Some(candidate_id) = state.ready_to_run.pop_front() else {
                    break;
                };
                let Some(candidate) = state.tasks.get(&candidate_id) else {
                    continue;
                };
                let compatible = candidate.array_id == seed_array
                    && candidate.current_task_resources == seed_resources
                    && batch.len() < MAX_BATCH_SIZE
                    && workflow_capacity > 0
                    && array_capacity.get(&seed_array).copied().unwrap_or(0) > 0;

                if compatible {
                    batch.push(candidate_id);
                    workflow_capacity -= 1;
                    *array_capacity.entry(seed_array).or_insert(0) -= 1;
                } else {
                    state.ready_to_run.push_back(candidate_id);
                }
            }

            match self.flush_batch(state, seed_array, &seed_resources, &batch).await {
                Ok(update) => combined.merge(update),
                Err(err) => {
                    tracing::warn!(error = %err, array_id = %seed_array, batch_size = batch.len(), "queue_task_batch failed, restoring batch to ready_to_run");
                    for &task_id in batch.iter().rev() {
                        state.ready_to_run.push_front(task_id);
                    }
                    break;
                }
            }
        }

        // Restore unschedulable tasks to the front, preserving order.
        for &task_id in unschedulable.iter().rev() {
            state.ready_to_run.push_front(task_id);
        }

        combined
    }

    async fn flush_batch(
        &self,
        state: &mut SwarmState,
        array_id: ArrayId,
        resources: &TaskResources,
        batch: &[TaskId],
    ) -> Result<StateUpdate, GatewayError> {
        let bound = if resources.is_bound {
            resources.clone()
        } else {
            let response = self.gateway.bind_task_resources(resources).await?;
            let bound = resources.bound(response.id);
            let interned = state.task_resources_cache.intern(bound);
            for &task_id in batch {
                if let Some(task) = state.tasks.get_mut(&task_id) {
                    task.current_task_resources = interned.clone();
                }
            }
            interned
        };

        let resources_id = bound.id.expect("bound TaskResources always carries an id");
        let cluster_id = batch
            .first()
            .and_then(|id| state.tasks.get(id))
            .map(|t| t.cluster)
            .unwrap_or(crate::domain::models::ClusterId(0));

        let response = self
            .gateway
            .queue_task_batch(array_id, batch, resources_id, state.workflow_run_id, cluster_id)
            .await?;

        let mut update = StateUpdate::default();
        for (status, task_ids) in response.tasks_by_status {
            for task_id in task_ids {
                update.task_statuses.insert(task_id, status);
            }
        }
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::GatewayError;
    use crate::domain::models::{ClusterId, QueueId, ResourceMap, SwarmArray, SwarmTask, TaskStatus};
    use crate::domain::ports::gateway::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex as StdMutex;

    struct FakeGateway {
        next_resource_id: AtomicI64,
        queue_calls: StdMutex<Vec<Vec<TaskId>>>,
        fail_next_queue: StdMutex<bool>,
    }

    impl FakeGateway {
        fn new() -> Self {
            Self {
                next_resource_id: AtomicI64::new(1),
                queue_calls: StdMutex::new(Vec::new()),
                fail_next_queue: StdMutex::new(false),
            }
        }
    }

    #[async_trait]
    impl Gateway for FakeGateway {
        async fn log_heartbeat(&self, _s: WorkflowRunStatus, _n: f64) -> Result<HeartbeatResponse, GatewayError> {
            unimplemented!()
        }
        async fn update_status(&self, target: WorkflowRunStatus) -> Result<UpdateStatusResponse, GatewayError> {
            Ok(UpdateStatusResponse { status: target })
        }
        async fn get_task_status_updates(
            &self,
            _f: bool,
            _l: Option<&str>,
        ) -> Result<TaskStatusUpdatesResponse, GatewayError> {
            unimplemented!()
        }
        async fn get_workflow_concurrency(&self, _w: i64) -> Result<u32, GatewayError> {
            unimplemented!()
        }
        async fn get_array_concurrency(&self, _a: ArrayId) -> Result<u32, GatewayError> {
            unimplemented!()
        }
        async fn queue_task_batch(
            &self,
            _array_id: ArrayId,
            task_ids: &[TaskId],
            _task_resources_id: i64,
            _workflow_run_id: i64,
            _cluster_id: ClusterId,
        ) -> Result<QueueTaskBatchResponse, GatewayError> {
            if *self.fail_next_queue.lock().unwrap() {
                *self.fail_next_queue.lock().unwrap() = false;
                return Err(GatewayError::RequestFailed("simulated".into()));
            }
            self.queue_calls.lock().unwrap().push(task_ids.to_vec());
            let mut tasks_by_status = HashMap::new();
            tasks_by_status.insert(TaskStatus::Queued, task_ids.to_vec());
            Ok(QueueTaskBatchResponse { tasks_by_status })
        }
        async fn terminate_task_instances(&self, _w: i64) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn bind_task_resources(&self, _r: &TaskResources) -> Result<BindTaskResourcesResponse, GatewayError> {
            let id = self.next_resource_id.fetch_add(1, Ordering::SeqCst);
            Ok(BindTaskResourcesResponse { id })
        }
    }

    fn make_state_with_ready_tasks(n: usize, array_cap: u32, wf_cap: u32) -> SwarmState {
        let mut state = SwarmState::new(1, 1, wf_cap);
        let array_id = ArrayId(1);
        state.insert_array(SwarmArray::new(array_id, "a", array_cap));
        for i in 0..n {
            let task_id = TaskId(i as i64 + 1);
            let mut task = SwarmTask::new(
                task_id,
                array_id,
                ClusterId(1),
                TaskResources::new(ResourceMap::new(), QueueId(1)),
            );
            task.status = TaskStatus::Registering;
            state.insert_task(task);
            state.arrays.get_mut(&array_id).unwrap().tasks.insert(task_id);
            state.ready_to_run.push_back(task_id);
        }
        state
    }

    #[tokio::test]
    async fn respects_workflow_capacity() {
        let gateway = std::sync::Arc::new(FakeGateway::new());
        let scheduler = Scheduler::new(gateway);
        let mut state = make_state_with_ready_tasks(5, 10, 2);

        let update = scheduler.tick(&mut state, Duration::ZERO, true).await;
        assert_eq!(update.task_statuses.len(), 2);
        assert_eq!(state.ready_to_run.len(), 3);
    }

    #[tokio::test]
    async fn preserves_order_of_unschedulable_tasks_across_ticks() {
        let gateway = std::sync::Arc::new(FakeGateway::new());
        let scheduler = Scheduler::new(gateway.clone());
        let mut state = make_state_with_ready_tasks(5, 10, 2);

        scheduler.tick(&mut state, Duration::ZERO, true).await;
        let remaining: Vec<TaskId> = state.ready_to_run.iter().copied().collect();
        assert_eq!(remaining, vec![TaskId(3), TaskId(4), TaskId(5)]);

        // Simulate tick-1's two tasks completing, freeing capacity.
        for id in [TaskId(1), TaskId(2)] {
            state.task_status_map.get_mut(&TaskStatus::Queued).unwrap().remove(&id);
            state.task_status_map.get_mut(&TaskStatus::Done).unwrap().insert(id);
            state.tasks.get_mut(&id).unwrap().status = TaskStatus::Done;
        }

        let update = scheduler.tick(&mut state, Duration::ZERO, true).await;
        assert_eq!(update.task_statuses.len(), 2);
        assert_eq!(state.ready_to_run.len(), 1);
    }

    #[tokio::test]
    async fn batches_same_array_and_resources_up_to_cap() {
        let gateway = std::sync::Arc::new(FakeGateway::new());
        let scheduler = Scheduler::new(gateway.clone());
        let mut state = make_state_with_ready_tasks(5, 10, 10);

        let update = scheduler.tick(&mut state, Duration::ZERO, true).await;
        assert_eq!(update.task_statuses.len(), 5);
        assert!(state.ready_to_run.is_empty());
        assert_eq!(gateway.queue_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn queue_failure_restores_batch_to_front() {
        let gateway = std::sync::Arc::new(FakeGateway::new());
        *gateway.fail_next_queue.lock().unwrap() = true;
        let scheduler = Scheduler::new(gateway.clone());
        let mut state = make_state_with_ready_tasks(3, 10, 10);

        let update = scheduler.tick(&mut state, Duration::ZERO, true).await;
        assert!(update.task_statuses.is_empty());
        assert_eq!(state.ready_to_run.len(), 3);
        let remaining: Vec<TaskId> = state.ready_to_run.iter().copied().collect();
        assert_eq!(remaining, vec![TaskId(1), TaskId(2), TaskId(3)]);
    }
}
