//! Domain error types for the swarm core.
//!
//! Each enum corresponds to a single subsystem, following the teacher's
//! per-concern `thiserror` convention: one enum per failure domain rather
//! than a single catch-all.

use thiserror::Error;

use crate::domain::models::ids::TaskId;

/// Errors surfaced by the [`crate::domain::ports::gateway::Gateway`] RPC
/// surface. The Gateway itself retries transient failures with bounded
/// backoff (spec §4.1); this type is what survives that retry budget.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// The request could not be completed after exhausting retries.
    #[error("gateway request failed: {0}")]
    RequestFailed(String),

    /// The server returned a response that could not be decoded.
    #[error("gateway response could not be decoded: {0}")]
    InvalidResponse(String),

    /// The server returned a non-success status.
    #[error("gateway returned status {status}: {message}")]
    ServerError { status: u16, message: String },
}

impl GatewayError {
    /// Returns true if a retry is worth attempting. Network errors and
    /// 5xx responses are transient; 4xx responses and decode failures
    /// are not (the request itself is malformed).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_) => true,
            Self::ServerError { status, .. } => *status >= 500,
            Self::InvalidResponse(_) => false,
        }
    }
}

/// The server refused a workflow-run status transition: it returned a
/// status different from the one requested (spec §4.1, §7).
#[derive(Error, Debug, Clone)]
#[error("cannot transition workflow run from current status to {requested}: server set {actual} instead")]
pub struct TransitionError {
    pub requested: crate::domain::models::status::WorkflowRunStatus,
    pub actual: crate::domain::models::status::WorkflowRunStatus,
}

/// Errors raised while validating or adjusting a task's resources.
#[derive(Error, Debug, Clone)]
pub enum ResourceError {
    /// `task.compute_resources_callable` returned something other than
    /// a resource mapping (spec §4.5, §7).
    #[error("compute_resources_callable for task {task_id} returned an invalid object")]
    CallableReturnedInvalidObject { task_id: TaskId },
}

/// Fatal conditions that end the main loop (spec §7). Every variant here
/// triggers the orchestrator's best-effort transition to `ERROR` before
/// propagating.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// `config.timeout` elapsed before all tasks reached a terminal state.
    /// Submitted tasks continue running on the cluster; only the local
    /// coordinator gives up.
    #[error(
        "workflow run did not complete within the {timeout_secs}s timeout; \
         submitted tasks will continue running on the cluster"
    )]
    Timeout { timeout_secs: u64 },

    /// The injected distributor liveness probe returned false.
    #[error("distributor process is not alive; workflow run will error")]
    DistributorNotAlive,

    /// `fail_fast` is set and at least one task reached `ERROR_FATAL`.
    #[error("fail-fast: stopping after first task failure")]
    FailFast,

    /// Test hook: `fail_after_n_executions` was reached.
    #[error("workflow run asked to fail after {n_executions} executions")]
    FailAfterNExecutions { n_executions: u64 },

    /// A resource-validation callable misbehaved.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// An RPC to the server failed after exhausting retries.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The server refused a requested status transition.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_transience() {
        assert!(GatewayError::RequestFailed("timeout".into()).is_transient());
        assert!(GatewayError::ServerError {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(!GatewayError::ServerError {
            status: 400,
            message: "bad request".into()
        }
        .is_transient());
        assert!(!GatewayError::InvalidResponse("bad json".into()).is_transient());
    }

    #[test]
    fn orchestrator_error_messages_mention_cluster_continuation() {
        let err = OrchestratorError::Timeout { timeout_secs: 36000 };
        assert!(err.to_string().contains("continue running on the cluster"));
    }
}
