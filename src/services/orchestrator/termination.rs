//! Resume/kill signal handling (spec §4.5 step 4, §7 "Terminating run").

use crate::domain::error::GatewayError;
use crate::domain::models::{SwarmState, TaskStatus};
use crate::domain::ports::Gateway;

use super::types::LoopOutcome;

const WAIT_STATUSES: [TaskStatus; 3] = [TaskStatus::Instantiating, TaskStatus::Launched, TaskStatus::Running];

/// A resume signal (`COLD_RESUME`/`HOT_RESUME`) was observed via the
/// heartbeat channel. While any task is still in flight, ask the server
/// to terminate those instances and keep waiting; once none remain the
/// main loop may exit.
pub async fn handle_termination<G: Gateway>(state: &SwarmState, gateway: &G) -> Result<LoopOutcome, GatewayError> {
    let any_in_flight = WAIT_STATUSES
        .iter()
        .any(|status| state.task_status_map.get(status).is_some_and(|ids| !ids.is_empty()));

    if any_in_flight {
        tracing::warn!(status = %state.status, "workflow run set to resume status, waiting for in-flight tasks to stop");
        gateway.terminate_task_instances(state.workflow_run_id).await?;
        Ok(LoopOutcome::Continue)
    } else {
        Ok(LoopOutcome::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ArrayId, ClusterId, QueueId, ResourceMap, SwarmTask, TaskId, TaskResources, WorkflowRunStatus};
    use crate::domain::ports::gateway::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct FakeGateway {
        terminate_calls: StdMutex<u32>,
    }

    #[async_trait]
    impl Gateway for FakeGateway {
        async fn log_heartbeat(&self, _s: WorkflowRunStatus, _n: f64) -> Result<HeartbeatResponse, GatewayError> {
            unimplemented!()
        }
        async fn update_status(&self, target: WorkflowRunStatus) -> Result<UpdateStatusResponse, GatewayError> {
            Ok(UpdateStatusResponse { status: target })
        }
        async fn get_task_status_updates(&self, _f: bool, _l: Option<&str>) -> Result<TaskStatusUpdatesResponse, GatewayError> {
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
            _a: ArrayId,
            _t: &[TaskId],
            _r: i64,
            _w: i64,
            _c: ClusterId,
        ) -> Result<QueueTaskBatchResponse, GatewayError> {
            unimplemented!()
        }
        async fn terminate_task_instances(&self, _workflow_run_id: i64) -> Result<(), GatewayError> {
            *self.terminate_calls.lock().unwrap() += 1;
            Ok(())
        }
        async fn bind_task_resources(&self, _r: &TaskResources) -> Result<BindTaskResourcesResponse, GatewayError> {
            unimplemented!()
        }
    }

    fn make_task(id: i64, status: TaskStatus) -> SwarmTask {
        let mut t = SwarmTask::new(TaskId(id), ArrayId(1), ClusterId(1), TaskResources::new(ResourceMap::new(), QueueId(1)));
        t.status = status;
        t
    }

    #[tokio::test]
    async fn continues_while_tasks_in_flight() {
        let gateway = FakeGateway { terminate_calls: StdMutex::new(0) };
        let mut state = SwarmState::new(1, 1, 10);
        state.insert_task(make_task(1, TaskStatus::Running));
        state.status = WorkflowRunStatus::ColdResume;

        let outcome = handle_termination(&state, &gateway).await.unwrap();
        assert_eq!(outcome, LoopOutcome::Continue);
        assert_eq!(*gateway.terminate_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn stops_once_nothing_in_flight() {
        let gateway = FakeGateway { terminate_calls: StdMutex::new(0) };
        let mut state = SwarmState::new(1, 1, 10);
        state.insert_task(make_task(1, TaskStatus::Done));
        state.status = WorkflowRunStatus::ColdResume;

        let outcome = handle_termination(&state, &gateway).await.unwrap();
        assert_eq!(outcome, LoopOutcome::Stop);
        assert_eq!(*gateway.terminate_calls.lock().unwrap(), 0);
    }
}
