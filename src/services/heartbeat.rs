//! Heartbeat service (spec §4.2): a periodic liveness beacon that also
//! acts as the channel through which the server delivers resume/stop
//! signals.
//!
//! Modeled as a cooperative background task publishing onto a
//! single-reader `watch` channel (spec §9 "Async/background heartbeat →
//! task+channel"): the Orchestrator only ever wants the *latest* status,
//! which is exactly what `watch` gives for free, unlike an mpsc channel
//! that would need manual draining.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::domain::models::WorkflowRunStatus;
use crate::domain::ports::Gateway;

/// Shared, lock-free clock for "how long since the last heartbeat tick",
/// read by the Orchestrator every main-loop iteration without awaiting
/// the background task.
#[derive(Debug)]
struct HeartbeatClock {
    epoch: Instant,
    last_tick_millis: AtomicI64,
}

impl HeartbeatClock {
    fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_tick_millis: AtomicI64::new(0),
        }
    }

    fn record_tick(&self) {
        let elapsed = self.epoch.elapsed().as_millis() as i64;
        self.last_tick_millis.store(elapsed, Ordering::Relaxed);
    }

    fn time_since_last_tick(&self) -> Duration {
        let now = self.epoch.elapsed().as_millis() as i64;
        let last = self.last_tick_millis.load(Ordering::Relaxed);
        Duration::from_millis((now - last).max(0) as u64)
    }
}

/// Handle the Orchestrator holds to read the Heartbeat's latest observed
/// status and timing, independent of the background task's lifetime.
#[derive(Clone)]
pub struct HeartbeatHandle {
    status_rx: watch::Receiver<WorkflowRunStatus>,
    clock: Arc<HeartbeatClock>,
}

impl HeartbeatHandle {
    /// The most recent server-returned status.
    #[must_use]
    pub fn current_status(&self) -> WorkflowRunStatus {
        *self.status_rx.borrow()
    }

    #[must_use]
    pub fn time_since_last_heartbeat(&self) -> Duration {
        self.clock.time_since_last_tick()
    }
}

/// Runs in the background for the lifetime of the run.
pub struct HeartbeatService<G: Gateway> {
    gateway: Arc<G>,
    interval: Duration,
    report_by_buffer: f64,
    status_tx: watch::Sender<WorkflowRunStatus>,
    clock: Arc<HeartbeatClock>,
}

impl<G: Gateway + 'static> HeartbeatService<G> {
    #[must_use]
    pub fn new(gateway: Arc<G>, interval: Duration, report_by_buffer: f64, initial_status: WorkflowRunStatus) -> Self {
        let (status_tx, _status_rx) = watch::channel(initial_status);
        Self {
            gateway,
            interval,
            report_by_buffer,
            status_tx,
            clock: Arc::new(HeartbeatClock::new()),
        }
    }

    /// Force the locally-observed status, used by the Orchestrator after a
    /// successful `update_status` RPC so the heartbeat's watch channel
    /// doesn't briefly disagree with the status that initiated it.
    pub fn set_status(&self, status: WorkflowRunStatus) {
        self.status_tx.send_if_modified(|s| {
            let changed = *s != status;
            *s = status;
            changed
        });
    }

    /// A cloneable, cheap handle for the Orchestrator to poll.
    #[must_use]
    pub fn handle(&self) -> HeartbeatHandle {
        HeartbeatHandle {
            status_rx: self.status_tx.subscribe(),
            clock: self.clock.clone(),
        }
    }

    /// Every `interval`, call `log_heartbeat(current_status,
    /// next_report_increment)`. Stops without issuing further calls once
    /// `stop_rx` is signalled — cancellation is expected during teardown.
    /// A failed heartbeat RPC is logged and retried on the next tick; it
    /// does not by itself abort the run.
    pub async fn run_background(&self, mut stop_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        tracing::debug!("heartbeat service cancelled");
                        return;
                    }
                }
            }
        }
    }

    async fn tick(&self) {
        let current_status = *self.status_tx.borrow();
        let next_report_increment = self.interval.as_secs_f64() * self.report_by_buffer;

        match self.gateway.log_heartbeat(current_status, next_report_increment).await {
            Ok(response) => {
                self.clock.record_tick();
                if response.status != current_status {
                    tracing::info!(
                        from = %current_status,
                        to = %response.status,
                        "heartbeat observed server-driven status change"
                    );
                }
                // `send_if_modified` avoids waking the watch receiver on
                // every identical tick.
                self.status_tx.send_if_modified(|s| {
                    let changed = *s != response.status;
                    *s = response.status;
                    changed
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "heartbeat RPC failed, will retry next tick");
                // The tick still "happened" from a timing perspective —
                // the clock advances regardless of RPC success so the
                // Orchestrator's sync cadence doesn't spin.
                self.clock.record_tick();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::GatewayError;
    use crate::domain::models::{ArrayId, ClusterId, TaskId, TaskResources};
    use crate::domain::ports::gateway::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct FakeGateway {
        responses: StdMutex<Vec<WorkflowRunStatus>>,
    }

    #[async_trait]
    impl Gateway for FakeGateway {
        async fn log_heartbeat(
            &self,
            _status: WorkflowRunStatus,
            _next_report_increment: f64,
        ) -> Result<HeartbeatResponse, GatewayError> {
            let mut responses = self.responses.lock().unwrap();
            let status = if responses.len() > 1 {
                responses.remove(0)
            } else {
                *responses.first().unwrap()
            };
            Ok(HeartbeatResponse { status })
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
                time: "t".into(),
                tasks_by_status: Default::default(),
            })
        }
        async fn get_workflow_concurrency(&self, _workflow_id: i64) -> Result<u32, GatewayError> {
            Ok(10)
        }
        async fn get_array_concurrency(&self, _array_id: ArrayId) -> Result<u32, GatewayError> {
            Ok(10)
        }
        async fn queue_task_batch(
            &self,
            _array_id: ArrayId,
            _task_ids: &[TaskId],
            _task_resources_id: i64,
            _workflow_run_id: i64,
            _cluster_id: ClusterId,
        ) -> Result<QueueTaskBatchResponse, GatewayError> {
            Ok(QueueTaskBatchResponse { tasks_by_status: Default::default() })
        }
        async fn terminate_task_instances(&self, _workflow_run_id: i64) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn bind_task_resources(&self, _resources: &TaskResources) -> Result<BindTaskResourcesResponse, GatewayError> {
            Ok(BindTaskResourcesResponse { id: 1 })
        }
    }

    #[tokio::test]
    async fn heartbeat_adopts_server_driven_status() {
        let gateway = Arc::new(FakeGateway {
            responses: StdMutex::new(vec![WorkflowRunStatus::ColdResume]),
        });
        let service = HeartbeatService::new(
            gateway,
            Duration::from_millis(10),
            1.5,
            WorkflowRunStatus::Running,
        );
        let handle = service.handle();
        assert_eq!(handle.current_status(), WorkflowRunStatus::Running);

        service.tick().await;
        assert_eq!(handle.current_status(), WorkflowRunStatus::ColdResume);
    }

    #[tokio::test]
    async fn set_status_is_observed_without_a_tick() {
        let gateway = Arc::new(FakeGateway {
            responses: StdMutex::new(vec![WorkflowRunStatus::Running]),
        });
        let service = HeartbeatService::new(gateway, Duration::from_secs(30), 1.5, WorkflowRunStatus::Bound);
        let handle = service.handle();
        service.set_status(WorkflowRunStatus::Running);
        assert_eq!(handle.current_status(), WorkflowRunStatus::Running);
    }

    #[tokio::test]
    async fn cancellation_stops_the_background_loop() {
        let gateway = Arc::new(FakeGateway {
            responses: StdMutex::new(vec![WorkflowRunStatus::Running]),
        });
        let service = HeartbeatService::new(gateway, Duration::from_millis(5), 1.5, WorkflowRunStatus::Running);
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            service.run_background(stop_rx).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("heartbeat task should stop promptly after cancellation")
            .unwrap();
    }
}
