//! `Gateway`: the typed RPC surface over the server (spec §4.1, §6.3).
//!
//! No state of its own beyond a shared session. The Gateway does not
//! interpret status codes — it decodes response bodies into typed values
//! only; retry/backoff for transient failures happens inside the
//! implementation, not in callers.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::error::GatewayError;
use crate::domain::models::{ArrayId, ClusterId, TaskId, TaskStatus, WorkflowRunStatus};

/// Response to `log_heartbeat`: the server's authoritative status, which
/// may differ from the one sent (server-initiated resume/stop).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatResponse {
    pub status: WorkflowRunStatus,
}

/// Response to `update_status`: the status the server actually set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatusResponse {
    pub status: WorkflowRunStatus,
}

/// Response to `get_task_status_updates`.
#[derive(Debug, Clone)]
pub struct TaskStatusUpdatesResponse {
    /// New sync token.
    pub time: String,
    /// Per-status buckets of task ids, as returned by the server.
    pub tasks_by_status: HashMap<TaskStatus, Vec<TaskId>>,
}

/// Response to `queue_task_batch`: authoritative per-task status after
/// the transition.
#[derive(Debug, Clone)]
pub struct QueueTaskBatchResponse {
    pub tasks_by_status: HashMap<TaskStatus, Vec<TaskId>>,
}

/// Response to `bind_task_resources`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindTaskResourcesResponse {
    pub id: i64,
}

/// Typed RPC client to the server (spec §4.1, §6.3). Every operation the
/// swarm core requires; implementations (e.g. an HTTP client) own
/// transport, auth, and retry policy.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Periodic liveness beacon; doubles as the channel through which the
    /// server delivers resume/stop signals.
    async fn log_heartbeat(
        &self,
        status: WorkflowRunStatus,
        next_report_increment: f64,
    ) -> Result<HeartbeatResponse, GatewayError>;

    /// Attempt a local→target workflow-run status transition. If the
    /// returned status differs from `target`, the caller must treat this
    /// as a transition failure.
    async fn update_status(
        &self,
        target: WorkflowRunStatus,
    ) -> Result<UpdateStatusResponse, GatewayError>;

    /// Incremental when `full_sync=false` (only tasks changed since
    /// `last_sync`); authoritative when `full_sync=true`.
    async fn get_task_status_updates(
        &self,
        full_sync: bool,
        last_sync: Option<&str>,
    ) -> Result<TaskStatusUpdatesResponse, GatewayError>;

    async fn get_workflow_concurrency(&self, workflow_id: i64) -> Result<u32, GatewayError>;

    async fn get_array_concurrency(&self, array_id: ArrayId) -> Result<u32, GatewayError>;

    /// Atomically moves the batch to QUEUED on the server and returns the
    /// authoritative per-task status after the transition.
    async fn queue_task_batch(
        &self,
        array_id: ArrayId,
        task_ids: &[TaskId],
        task_resources_id: i64,
        workflow_run_id: i64,
        cluster_id: ClusterId,
    ) -> Result<QueueTaskBatchResponse, GatewayError>;

    /// Requests the server mark in-flight task instances for termination
    /// (used on resume signals).
    async fn terminate_task_instances(&self, workflow_run_id: i64) -> Result<(), GatewayError>;

    /// Ensures a `TaskResources` value is persisted and returns its id.
    async fn bind_task_resources(
        &self,
        resources: &crate::domain::models::TaskResources,
    ) -> Result<BindTaskResourcesResponse, GatewayError>;
}
