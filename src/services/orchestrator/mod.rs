//! The Orchestrator (spec §4.5): a thin coordinator driving Heartbeat,
//! Synchronizer, and Scheduler through one workflow run's main loop.
//!
//! Grounded on the source system's `WorkflowRunOrchestrator`: same phase
//! split (initialize / main loop / finalize), same constraint checks per
//! iteration, reworked as typed `Result`/`?` control flow instead of
//! exceptions (spec §9 "DESIGN NOTES").

mod propagate;
mod termination;
mod types;

pub use types::{LoopOutcome, OrchestratorConfig, OrchestratorResult};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::domain::error::{OrchestratorError, TransitionError};
use crate::domain::models::{SwarmState, TaskId, TaskStatus, WorkflowRunStatus};
use crate::domain::ports::{DistributorProbe, Gateway};
use crate::services::heartbeat::HeartbeatService;
use crate::services::scheduler::Scheduler;
use crate::services::synchronizer::Synchronizer;

pub struct Orchestrator<G: Gateway + 'static, D: DistributorProbe + 'static> {
    state: SwarmState,
    config: OrchestratorConfig,
    gateway: Arc<G>,
    distributor: Arc<D>,
    heartbeat: Arc<HeartbeatService<G>>,
    synchronizer: Synchronizer<G>,
    scheduler: Scheduler<G>,
}

impl<G: Gateway + 'static, D: DistributorProbe + 'static> Orchestrator<G, D> {
    #[must_use]
    pub fn new(gateway: Arc<G>, distributor: Arc<D>, state: SwarmState, config: OrchestratorConfig) -> Self {
        let workflow_id = state.workflow_id;
        let task_ids = state.tasks.keys().copied().collect();
        let array_ids = state.arrays.keys().copied().collect();

        let heartbeat = Arc::new(HeartbeatService::new(
            Arc::clone(&gateway),
            config.heartbeat_interval,
            config.heartbeat_report_by_buffer,
            state.status,
        ));
        let mut synchronizer = Synchronizer::new(Arc::clone(&gateway), workflow_id);
        synchronizer.set_known_task_ids(task_ids);
        synchronizer.set_known_array_ids(array_ids);
        let scheduler = Scheduler::new(Arc::clone(&gateway));

        Self {
            state,
            config,
            gateway,
            distributor,
            heartbeat,
            synchronizer,
            scheduler,
        }
    }

    /// Run the workflow to completion. The heartbeat background task is
    /// spawned and torn down around the main loop regardless of outcome.
    pub async fn run(mut self) -> Result<OrchestratorResult, OrchestratorError> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let heartbeat = Arc::clone(&self.heartbeat);
        let heartbeat_task = tokio::spawn(async move { heartbeat.run_background(stop_rx).await });

        let start = Instant::now();
        let outcome = self.run_inner(start).await;

        let _ = stop_tx.send(true);
        if let Err(join_err) = heartbeat_task.await {
            tracing::warn!(error = %join_err, "heartbeat task panicked during teardown");
        }

        match outcome {
            Ok(()) => self.finalize(start).await,
            Err(err) => {
                self.handle_error().await;
                Err(err)
            }
        }
    }

    async fn run_inner(&mut self, start: Instant) -> Result<(), OrchestratorError> {
        tracing::info!(workflow_run_id = self.state.workflow_run_id, "starting workflow run orchestrator");
        self.initialize().await?;
        self.main_loop(start).await
    }

    // ── Initialization ──────────────────────────────────────────────

    async fn initialize(&mut self) -> Result<(), OrchestratorError> {
        self.set_initial_fringe()?;
        if self.state.status == WorkflowRunStatus::Running {
            return Ok(());
        }
        self.update_status(WorkflowRunStatus::Running).await
    }

    /// Populate `ready_to_run` with tasks whose upstreams are already
    /// satisfied, and with any task left mid-adjustment from a prior run.
    fn set_initial_fringe(&mut self) -> Result<(), OrchestratorError> {
        let adjusting: Vec<TaskId> = self
            .state
            .task_status_map
            .get(&TaskStatus::AdjustingResources)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        for task_id in adjusting {
            propagate::set_adjusted_task_resources(&mut self.state, task_id);
            self.state.ready_to_run.push_back(task_id);
        }

        let registering: Vec<TaskId> = self
            .state
            .task_status_map
            .get(&TaskStatus::Registering)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        for task_id in registering {
            let ready = self.state.tasks.get(&task_id).is_some_and(|t| t.all_upstreams_done());
            if ready {
                propagate::set_validated_task_resources(&mut self.state, task_id)?;
                self.state.ready_to_run.push_back(task_id);
            }
        }

        tracing::debug!(ready_to_run_count = self.state.ready_to_run.len(), "initial fringe set");
        Ok(())
    }

    // ── Main loop ────────────────────────────────────────────────────

    async fn main_loop(&mut self, start: Instant) -> Result<(), OrchestratorError> {
        let mut time_since_last_full_sync = Duration::ZERO;

        while self.should_continue() {
            let iteration_start = Instant::now();

            self.check_timeout(start)?;
            self.check_distributor_alive().await?;
            self.adopt_heartbeat_status();

            if self.state.status.is_server_stop() {
                tracing::warn!(status = %self.state.status, "workflow run status set by server, stopping scheduler");
                break;
            }

            let terminating = self.state.status.is_terminating();
            if terminating {
                if self.handle_termination().await? == LoopOutcome::Stop {
                    break;
                }
                // Fall through into the sleep+sync cycle below so status
                // updates keep flowing in while in-flight tasks wind down
                // (spec: "do not start new work").
            } else {
                self.check_fail_fast()?;
            }

            let time_till_next_sync = self
                .config
                .heartbeat_interval
                .saturating_sub(self.heartbeat.handle().time_since_last_heartbeat());

            if !terminating && self.state.status == WorkflowRunStatus::Running {
                self.do_scheduling(time_till_next_sync).await?;
            }

            let loop_elapsed = iteration_start.elapsed();
            if loop_elapsed < time_till_next_sync {
                tokio::time::sleep(time_till_next_sync - loop_elapsed).await;
            }
            let loop_elapsed = iteration_start.elapsed();

            if time_since_last_full_sync > self.config.wedged_workflow_sync_interval {
                time_since_last_full_sync = Duration::ZERO;
                self.do_sync(true).await?;
            } else {
                time_since_last_full_sync += loop_elapsed;
                self.do_sync(false).await?;
            }

            self.check_fail_after_n_executions()?;

            if !self.should_continue() && !self.state.all_tasks_final() {
                // No observable work left, but tasks remain outstanding —
                // force one more authoritative sync before giving up.
                self.do_sync(true).await?;
                time_since_last_full_sync = Duration::ZERO;
            }
        }
        Ok(())
    }

    fn should_continue(&self) -> bool {
        if self.state.status.is_server_stop() {
            return false;
        }
        if self.state.all_tasks_final() {
            return false;
        }
        self.state.has_pending_work()
    }

    // ── Constraint checks ────────────────────────────────────────────

    fn check_timeout(&self, start: Instant) -> Result<(), OrchestratorError> {
        if start.elapsed() >= self.config.timeout {
            return Err(OrchestratorError::Timeout {
                timeout_secs: self.config.timeout.as_secs(),
            });
        }
        Ok(())
    }

    async fn check_distributor_alive(&self) -> Result<(), OrchestratorError> {
        let distributor = Arc::clone(&self.distributor);
        let alive = tokio::task::spawn_blocking(move || distributor.is_alive())
            .await
            .unwrap_or(false);
        if !alive {
            return Err(OrchestratorError::DistributorNotAlive);
        }
        Ok(())
    }

    fn check_fail_fast(&self) -> Result<(), OrchestratorError> {
        if self.config.fail_fast && self.state.failed_count() > 0 {
            tracing::info!("failing after first failure, as requested");
            return Err(OrchestratorError::FailFast);
        }
        Ok(())
    }

    fn check_fail_after_n_executions(&self) -> Result<(), OrchestratorError> {
        if let Some(n) = self.config.fail_after_n_executions {
            if self.state.n_executions >= n {
                return Err(OrchestratorError::FailAfterNExecutions {
                    n_executions: self.state.n_executions,
                });
            }
        }
        Ok(())
    }

    // ── Scheduling / sync ────────────────────────────────────────────

    async fn do_scheduling(&mut self, timeout: Duration) -> Result<(), OrchestratorError> {
        let update = self.scheduler.tick(&mut self.state, timeout, false).await;
        if !update.task_statuses.is_empty() {
            let changed = self.state.apply_update(&update);
            propagate::propagate_changed_tasks(&mut self.state, changed)?;
        }
        Ok(())
    }

    async fn do_sync(&mut self, full_sync: bool) -> Result<(), OrchestratorError> {
        let current_statuses: HashMap<TaskId, TaskStatus> =
            self.state.tasks.iter().map(|(&id, t)| (id, t.status)).collect();
        let update = self
            .synchronizer
            .tick(full_sync, self.state.last_sync.as_deref(), &current_statuses)
            .await?;

        let changed = self.state.apply_update(&update);
        propagate::propagate_changed_tasks(&mut self.state, changed)?;

        tracing::debug!(
            ready_to_run_count = self.state.ready_to_run.len(),
            active_tasks = self.state.active_count(),
            full_sync,
            "state synchronized"
        );
        Ok(())
    }

    /// Heartbeat is the only channel through which the server delivers a
    /// resume/stop signal (spec §4.2, §9 "Async/background heartbeat").
    /// Every iteration, fold its latest observed status into local state
    /// so `is_server_stop`/`is_terminating` checks see it.
    fn adopt_heartbeat_status(&mut self) {
        let observed = self.heartbeat.handle().current_status();
        if observed != self.state.status {
            tracing::info!(from = %self.state.status, to = %observed, "adopting server-driven status from heartbeat");
            self.state.status = observed;
        }
    }

    async fn handle_termination(&mut self) -> Result<LoopOutcome, OrchestratorError> {
        let outcome = termination::handle_termination(&self.state, self.gateway.as_ref()).await?;
        Ok(outcome)
    }

    // ── Status management ────────────────────────────────────────────

    async fn update_status(&mut self, target: WorkflowRunStatus) -> Result<(), OrchestratorError> {
        let response = self.gateway.update_status(target).await?;
        if response.status != target {
            return Err(TransitionError {
                requested: target,
                actual: response.status,
            }
            .into());
        }
        self.state.status = response.status;
        self.heartbeat.set_status(response.status);
        Ok(())
    }

    /// Like [`Self::update_status`] but a refused transition is logged and
    /// swallowed rather than propagated, so the caller can still finish
    /// building an [`OrchestratorResult`] (spec §7: "In `_finalize`/
    /// `_handle_error` it is logged and swallowed so the run can still
    /// terminate").
    async fn try_update_status(&mut self, target: WorkflowRunStatus) {
        if let Err(err) = self.update_status(target).await {
            tracing::warn!(error = %err, target = %target, "status transition was refused or failed during finalization");
        }
    }

    // ── Finalization ─────────────────────────────────────────────────

    async fn finalize(&mut self, start: Instant) -> Result<OrchestratorResult, OrchestratorError> {
        let elapsed_time = start.elapsed();
        let done_count = self.state.done_count();
        let failed_count = self.state.failed_count();
        let total_tasks = self.state.tasks.len();

        if total_tasks == done_count {
            tracing::info!("all tasks are done");
            self.try_update_status(WorkflowRunStatus::Done).await;
        } else if self.state.status.is_terminating() {
            self.try_update_status(WorkflowRunStatus::Terminated).await;
        } else if self.state.status.is_server_stop() {
            tracing::info!(status = %self.state.status, "workflow run exited with server-set status");
        } else {
            self.try_update_status(WorkflowRunStatus::Error).await;
        }

        let task_final_statuses: HashMap<TaskId, TaskStatus> =
            self.state.tasks.iter().map(|(&id, t)| (id, t.status)).collect();
        let done_task_ids = self
            .state
            .task_status_map
            .get(&TaskStatus::Done)
            .cloned()
            .unwrap_or_default();
        let failed_task_ids = self
            .state
            .task_status_map
            .get(&TaskStatus::ErrorFatal)
            .cloned()
            .unwrap_or_default();

        Ok(OrchestratorResult {
            final_status: self.state.status,
            elapsed_time,
            total_tasks,
            done_count,
            failed_count,
            num_previously_complete: self.state.num_previously_complete,
            task_final_statuses,
            done_task_ids,
            failed_task_ids,
        })
    }

    async fn handle_error(&mut self) {
        self.try_update_status(WorkflowRunStatus::Error).await;
    }
}
