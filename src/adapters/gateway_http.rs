//! HTTP [`Gateway`] implementation, grounded on the teacher's
//! `infrastructure::claude::client`/`retry` pair: a thin `reqwest` client
//! wrapped in an exponential-backoff retry loop, here using the `backoff`
//! crate directly rather than the teacher's hand-rolled `RetryPolicy`
//! (both express the same doubling-with-cap schedule; `backoff` is what
//! the rest of the teacher's codebase reaches for outside the claude
//! module, so this adapter follows that majority convention).

use std::collections::HashMap;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};

use crate::domain::error::GatewayError;
use crate::domain::models::{
    ArrayId, ClusterId, GatewayConfig, TaskId, TaskResources, TaskStatus, WorkflowRunStatus,
};
use crate::domain::ports::gateway::{
    BindTaskResourcesResponse, Gateway, HeartbeatResponse, QueueTaskBatchResponse,
    TaskStatusUpdatesResponse, UpdateStatusResponse,
};

/// `reqwest`-backed [`Gateway`]. Owns one client (connection pool) and the
/// base URL/retry policy derived from [`GatewayConfig`].
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    workflow_run_id: i64,
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl HttpGateway {
    /// # Errors
    /// Returns an error if the underlying `reqwest::Client` cannot be
    /// built (e.g. TLS backend initialization failure).
    pub fn new(config: &GatewayConfig, workflow_run_id: i64) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GatewayError::RequestFailed(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            workflow_run_id,
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        })
    }

    fn backoff_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(self.initial_backoff_ms),
            max_interval: Duration::from_millis(self.max_backoff_ms),
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    /// Runs `op` under the retry policy, stopping early on permanent
    /// [`GatewayError`]s. `op` is re-invoked from scratch on each retry,
    /// matching the teacher's `RetryPolicy::execute` shape.
    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, GatewayError>>,
    {
        let mut backoff = self.backoff_policy();
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let exhausted = attempt >= self.max_retries;
                    if !err.is_transient() || exhausted {
                        return Err(err);
                    }
                    let wait = backoff.next_backoff().unwrap_or(Duration::from_millis(self.max_backoff_ms));
                    tracing::warn!(attempt, max_retries = self.max_retries, error = %err, wait_ms = wait.as_millis() as u64, "retrying gateway request");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<R, GatewayError> {
        let response = self
            .client
            .request(method, self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::ServerError { status: status.as_u16(), message });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Gateway for HttpGateway {
    async fn log_heartbeat(
        &self,
        status: WorkflowRunStatus,
        next_report_increment: f64,
    ) -> Result<HeartbeatResponse, GatewayError> {
        #[derive(Serialize)]
        struct Req {
            status: WorkflowRunStatus,
            next_report_increment: f64,
        }
        #[derive(Deserialize)]
        struct Resp {
            status: WorkflowRunStatus,
        }

        let path = format!("/workflow_run/{}/log_heartbeat", self.workflow_run_id);
        let resp: Resp = self
            .with_retry(|| {
                self.send_json(reqwest::Method::POST, &path, &Req { status, next_report_increment })
            })
            .await?;
        Ok(HeartbeatResponse { status: resp.status })
    }

    async fn update_status(
        &self,
        target: WorkflowRunStatus,
    ) -> Result<UpdateStatusResponse, GatewayError> {
        #[derive(Serialize)]
        struct Req {
            status: WorkflowRunStatus,
        }
        #[derive(Deserialize)]
        struct Resp {
            status: WorkflowRunStatus,
        }

        let path = format!("/workflow_run/{}/status", self.workflow_run_id);
        let resp: Resp = self
            .with_retry(|| self.send_json(reqwest::Method::PUT, &path, &Req { status: target }))
            .await?;
        Ok(UpdateStatusResponse { status: resp.status })
    }

    async fn get_task_status_updates(
        &self,
        full_sync: bool,
        last_sync: Option<&str>,
    ) -> Result<TaskStatusUpdatesResponse, GatewayError> {
        #[derive(Deserialize)]
        struct Resp {
            time: String,
            tasks_by_status: HashMap<TaskStatus, Vec<TaskId>>,
        }

        let path = match (full_sync, last_sync) {
            (true, _) => format!("/workflow_run/{}/task_status_updates?full_sync=true", self.workflow_run_id),
            (false, Some(since)) => format!(
                "/workflow_run/{}/task_status_updates?last_sync={since}",
                self.workflow_run_id
            ),
            (false, None) => format!("/workflow_run/{}/task_status_updates?full_sync=true", self.workflow_run_id),
        };

        let resp: Resp = self
            .with_retry(|| self.send_json(reqwest::Method::GET, &path, &serde_json::Value::Null))
            .await?;
        Ok(TaskStatusUpdatesResponse { time: resp.time, tasks_by_status: resp.tasks_by_status })
    }

    async fn get_workflow_concurrency(&self, workflow_id: i64) -> Result<u32, GatewayError> {
        #[derive(Deserialize)]
        struct Resp {
            max_concurrently_running: u32,
        }
        let path = format!("/workflow/{workflow_id}/concurrency_limit");
        let resp: Resp = self
            .with_retry(|| self.send_json(reqwest::Method::GET, &path, &serde_json::Value::Null))
            .await?;
        Ok(resp.max_concurrently_running)
    }

    async fn get_array_concurrency(&self, array_id: ArrayId) -> Result<u32, GatewayError> {
        #[derive(Deserialize)]
        struct Resp {
            max_concurrently_running: u32,
        }
        let path = format!("/array/{}/concurrency_limit", array_id.0);
        let resp: Resp = self
            .with_retry(|| self.send_json(reqwest::Method::GET, &path, &serde_json::Value::Null))
            .await?;
        Ok(resp.max_concurrently_running)
    }

    async fn queue_task_batch(
        &self,
        array_id: ArrayId,
        task_ids: &[TaskId],
        task_resources_id: i64,
        workflow_run_id: i64,
        cluster_id: ClusterId,
    ) -> Result<QueueTaskBatchResponse, GatewayError> {
        #[derive(Serialize)]
        struct Req<'a> {
            array_id: i64,
            task_ids: &'a [TaskId],
            task_resources_id: i64,
            workflow_run_id: i64,
            cluster_id: i64,
        }
        #[derive(Deserialize)]
        struct Resp {
            tasks_by_status: HashMap<TaskStatus, Vec<TaskId>>,
        }

        let path = "/task/queue_batch".to_string();
        let req = Req {
            array_id: array_id.0,
            task_ids,
            task_resources_id,
            workflow_run_id,
            cluster_id: cluster_id.0,
        };
        let resp: Resp = self
            .with_retry(|| self.send_json(reqwest::Method::POST, &path, &req))
            .await?;
        Ok(QueueTaskBatchResponse { tasks_by_status: resp.tasks_by_status })
    }

    async fn terminate_task_instances(&self, workflow_run_id: i64) -> Result<(), GatewayError> {
        let path = format!("/workflow_run/{workflow_run_id}/terminate_task_instances");
        let _: serde_json::Value = self
            .with_retry(|| self.send_json(reqwest::Method::POST, &path, &serde_json::Value::Null))
            .await?;
        Ok(())
    }

    async fn bind_task_resources(
        &self,
        resources: &TaskResources,
    ) -> Result<BindTaskResourcesResponse, GatewayError> {
        #[derive(Serialize)]
        struct Req<'a> {
            requested_resources: &'a crate::domain::models::ResourceMap,
            queue_id: i64,
        }
        #[derive(Deserialize)]
        struct Resp {
            id: i64,
        }

        let path = "/task_resources/bind".to_string();
        let req = Req { requested_resources: &resources.requested_resources, queue_id: resources.queue.0 };
        let resp: Resp = self
            .with_retry(|| self.send_json(reqwest::Method::POST, &path, &req))
            .await?;
        Ok(BindTaskResourcesResponse { id: resp.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_strips_trailing_slash() {
        let config = GatewayConfig { base_url: "http://localhost:8080/".to_string(), ..GatewayConfig::default() };
        let gateway = HttpGateway::new(&config, 1).unwrap();
        assert_eq!(gateway.url("/status"), "http://localhost:8080/status");
    }

    #[test]
    fn backoff_policy_respects_configured_bounds() {
        let config = GatewayConfig {
            initial_backoff_ms: 50,
            max_backoff_ms: 500,
            ..GatewayConfig::default()
        };
        let gateway = HttpGateway::new(&config, 1).unwrap();
        let policy = gateway.backoff_policy();
        assert_eq!(policy.initial_interval, Duration::from_millis(50));
        assert_eq!(policy.max_interval, Duration::from_millis(500));
    }
}
