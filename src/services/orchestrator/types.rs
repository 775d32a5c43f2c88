//! Configuration, outcome, and control-flow types for the Orchestrator.

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::models::{SwarmConfig, TaskId, TaskStatus, WorkflowRunStatus};

/// Tunables for one orchestrator run (spec §6.4). Distinct from
/// [`SwarmConfig`] because the orchestrator only needs the subset that
/// governs loop pacing and flow control; logging/gateway config stays at
/// the infrastructure layer.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub heartbeat_interval: Duration,
    pub heartbeat_report_by_buffer: f64,
    pub wedged_workflow_sync_interval: Duration,
    pub fail_fast: bool,
    pub timeout: Duration,
    /// Test hook: force failure after N `DONE` transitions.
    pub fail_after_n_executions: Option<u64>,
}

impl From<&SwarmConfig> for OrchestratorConfig {
    fn from(config: &SwarmConfig) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs_f64(config.heartbeat_interval_secs),
            heartbeat_report_by_buffer: config.heartbeat_report_by_buffer,
            wedged_workflow_sync_interval: Duration::from_secs_f64(config.wedged_workflow_sync_interval_secs),
            fail_fast: config.fail_fast,
            timeout: Duration::from_secs(config.timeout_secs),
            fail_after_n_executions: config.fail_after_n_executions,
        }
    }
}

/// Summary returned once the main loop exits cleanly (spec §4.5, §6.5).
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorResult {
    pub final_status: WorkflowRunStatus,
    pub elapsed_time: Duration,
    pub total_tasks: usize,
    pub done_count: usize,
    pub failed_count: usize,
    /// Snapshot of the `DONE` count at build time, carried through
    /// unchanged so callers can tell "resumed work" from "this run's work".
    pub num_previously_complete: u32,
    pub task_final_statuses: HashMap<TaskId, TaskStatus>,
    pub done_task_ids: std::collections::HashSet<TaskId>,
    pub failed_task_ids: std::collections::HashSet<TaskId>,
}

/// Replaces the source system's exceptions-for-control-flow idiom (spec
/// §9 "DESIGN NOTES"): a resume-signal handler returns one of these
/// instead of a bare bool so the call site reads as a state machine, not
/// a guess about what `true` means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    Continue,
    Stop,
}
