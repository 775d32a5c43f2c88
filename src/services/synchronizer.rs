//! Synchronizer (spec §4.3): reconciles local state with the server,
//! incrementally by default and with a full authoritative fetch on
//! demand (the "wedged" recovery path).

use std::collections::{HashMap, HashSet};

use crate::domain::error::GatewayError;
use crate::domain::models::{ArrayId, StateUpdate, TaskId, TaskStatus};
use crate::domain::ports::Gateway;

/// Stateless between ticks beyond holding the set of known task and array
/// ids (spec §4.3): current task statuses are supplied by the caller on
/// each tick rather than cached here, so the Synchronizer itself carries
/// no drift-prone copy of the world.
pub struct Synchronizer<G: Gateway> {
    gateway: std::sync::Arc<G>,
    workflow_id: i64,
    task_ids: HashSet<TaskId>,
    array_ids: HashSet<ArrayId>,
}

impl<G: Gateway> Synchronizer<G> {
    #[must_use]
    pub fn new(gateway: std::sync::Arc<G>, workflow_id: i64) -> Self {
        Self {
            gateway,
            workflow_id,
            task_ids: HashSet::new(),
            array_ids: HashSet::new(),
        }
    }

    pub fn set_known_task_ids(&mut self, task_ids: HashSet<TaskId>) {
        self.task_ids = task_ids;
    }

    pub fn set_known_array_ids(&mut self, array_ids: HashSet<ArrayId>) {
        self.array_ids = array_ids;
    }

    /// Perform one sync pass.
    ///
    /// 1. Fetch `get_task_status_updates(full_sync, last_sync)`.
    ///    Intersect returned task ids with known ids (ignore foreign
    ///    ids). Keep only entries where the new status differs from
    ///    `current_statuses`.
    /// 2. Fetch workflow and per-array concurrency.
    /// 3. Return the combined `StateUpdate`.
    ///
    /// `full_sync=true` MUST request all task statuses regardless of
    /// `last_sync`; `full_sync=false` MUST pass `last_sync` so the server
    /// can return only the delta.
    pub async fn tick(
        &self,
        full_sync: bool,
        last_sync: Option<&str>,
        current_statuses: &HashMap<TaskId, TaskStatus>,
    ) -> Result<StateUpdate, GatewayError> {
        let last_sync_arg = if full_sync { None } else { last_sync };
        let response = self
            .gateway
            .get_task_status_updates(full_sync, last_sync_arg)
            .await?;

        let mut task_statuses = HashMap::new();
        for (status, task_ids) in response.tasks_by_status {
            for task_id in task_ids {
                if !self.task_ids.contains(&task_id) {
                    continue; // foreign id, ignore
                }
                if current_statuses.get(&task_id) == Some(&status) {
                    continue; // unchanged, skip
                }
                task_statuses.insert(task_id, status);
            }
        }

        let max_concurrently_running = self.gateway.get_workflow_concurrency(self.workflow_id).await?;

        let mut array_limits = HashMap::new();
        for &array_id in &self.array_ids {
            let limit = self.gateway.get_array_concurrency(array_id).await?;
            array_limits.insert(array_id, limit);
        }

        Ok(StateUpdate {
            task_statuses,
            workflow_run_status: None,
            sync_time: Some(response.time),
            max_concurrently_running: Some(max_concurrently_running),
            array_limits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::GatewayError;
    use crate::domain::models::{ClusterId, QueueId, TaskResources};
    use crate::domain::ports::gateway::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FakeGateway {
        tasks_by_status: HashMap<TaskStatus, Vec<TaskId>>,
        time: String,
        workflow_concurrency: u32,
        array_concurrency: u32,
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
            _full_sync: bool,
            _last_sync: Option<&str>,
        ) -> Result<TaskStatusUpdatesResponse, GatewayError> {
            Ok(TaskStatusUpdatesResponse {
                time: self.time.clone(),
                tasks_by_status: self.tasks_by_status.clone(),
            })
        }
        async fn get_workflow_concurrency(&self, _workflow_id: i64) -> Result<u32, GatewayError> {
            Ok(self.workflow_concurrency)
        }
        async fn get_array_concurrency(&self, _array_id: ArrayId) -> Result<u32, GatewayError> {
            Ok(self.array_concurrency)
        }
        async fn queue_task_batch(
            &self,
            _a: ArrayId,
            _t: &[TaskId],
            _r: i64,
            _w: i64,
            _c: ClusterId,
        ) -> Result<QueueTaskBatchResponse, GatewayError> {
            unimplemented!()
        }
        async fn terminate_task_instances(&self, _workflow_run_id: i64) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn bind_task_resources(&self, _r: &TaskResources) -> Result<BindTaskResourcesResponse, GatewayError> {
            unimplemented!()
        }
    }

    fn _unused_resources() -> TaskResources {
        TaskResources::new(Default::default(), QueueId(1))
    }

    #[tokio::test]
    async fn ignores_foreign_task_ids() {
        let mut tasks_by_status = HashMap::new();
        tasks_by_status.insert(TaskStatus::Done, vec![TaskId(1), TaskId(999)]);
        let gateway = Arc::new(FakeGateway {
            tasks_by_status,
            time: "t1".into(),
            workflow_concurrency: 10,
            array_concurrency: 5,
        });
        let mut sync = Synchronizer::new(gateway, 1);
        sync.set_known_task_ids(HashSet::from([TaskId(1)]));

        let update = sync.tick(true, None, &HashMap::new()).await.unwrap();
        assert_eq!(update.task_statuses.len(), 1);
        assert_eq!(update.task_statuses[&TaskId(1)], TaskStatus::Done);
    }

    #[tokio::test]
    async fn filters_out_unchanged_statuses() {
        let mut tasks_by_status = HashMap::new();
        tasks_by_status.insert(TaskStatus::Running, vec![TaskId(1)]);
        let gateway = Arc::new(FakeGateway {
            tasks_by_status,
            time: "t1".into(),
            workflow_concurrency: 10,
            array_concurrency: 5,
        });
        let mut sync = Synchronizer::new(gateway, 1);
        sync.set_known_task_ids(HashSet::from([TaskId(1)]));

        let mut current = HashMap::new();
        current.insert(TaskId(1), TaskStatus::Running);

        let update = sync.tick(false, Some("t0"), &current).await.unwrap();
        assert!(update.task_statuses.is_empty());
    }

    #[tokio::test]
    async fn collects_array_limits_for_known_arrays() {
        let gateway = Arc::new(FakeGateway {
            tasks_by_status: HashMap::new(),
            time: "t1".into(),
            workflow_concurrency: 7,
            array_concurrency: 3,
        });
        let mut sync = Synchronizer::new(gateway, 1);
        sync.set_known_array_ids(HashSet::from([ArrayId(1), ArrayId(2)]));

        let update = sync.tick(true, None, &HashMap::new()).await.unwrap();
        assert_eq!(update.max_concurrently_running, Some(7));
        assert_eq!(update.array_limits.len(), 2);
        assert_eq!(update.array_limits[&ArrayId(1)], 3);
    }
}
