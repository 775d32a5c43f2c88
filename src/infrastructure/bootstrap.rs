//! Loads an initial [`SwarmState`] from a JSON fixture file.
//!
//! Building the workflow DAG itself (task creation, upstream wiring) is a
//! named Non-goal of this core — that's the job of the system that owns
//! the workflow definition. This module exists only so the minimal `run`
//! binary has something to feed the Orchestrator for manual testing; a
//! real host process would construct `SwarmState` directly from its own
//! task-graph representation instead of round-tripping through JSON.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::models::{
    ArrayId, ClusterId, QueueId, ResourceMap, SwarmArray, SwarmState, SwarmTask, TaskId,
};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to read fixture file {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("failed to parse fixture file {path}: {source}")]
    Parse { path: String, source: serde_json::Error },

    #[error("task {task_id} references unknown array {array_id}")]
    UnknownArray { task_id: i64, array_id: i64 },

    #[error("task {task_id} references unknown upstream {upstream_id}")]
    UnknownUpstream { task_id: i64, upstream_id: i64 },
}

#[derive(Debug, Deserialize)]
pub struct FixtureArray {
    pub array_id: i64,
    pub array_name: String,
    pub max_concurrently_running: u32,
}

#[derive(Debug, Deserialize)]
pub struct FixtureTask {
    pub task_id: i64,
    pub array_id: i64,
    pub cluster_id: i64,
    pub queue_id: i64,
    #[serde(default)]
    pub requested_resources: ResourceMap,
    #[serde(default)]
    pub upstreams: Vec<i64>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

const fn default_max_attempts() -> u32 {
    3
}

#[derive(Debug, Deserialize)]
pub struct WorkflowFixture {
    pub workflow_run_id: i64,
    pub workflow_id: i64,
    pub max_concurrently_running: u32,
    pub arrays: Vec<FixtureArray>,
    pub tasks: Vec<FixtureTask>,
}

impl WorkflowFixture {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BootstrapError> {
        let path_ref = path.as_ref();
        let contents = std::fs::read_to_string(path_ref).map_err(|source| BootstrapError::Read {
            path: path_ref.display().to_string(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| BootstrapError::Parse {
            path: path_ref.display().to_string(),
            source,
        })
    }

    /// Build a fully-wired [`SwarmState`]: arrays inserted, tasks inserted
    /// with `num_upstreams`/`downstream_swarm_tasks` derived from
    /// `upstreams`, every task starting in `REGISTERING` (spec §3).
    pub fn into_state(self) -> Result<SwarmState, BootstrapError> {
        let mut state = SwarmState::new(self.workflow_run_id, self.workflow_id, self.max_concurrently_running);

        let array_ids: HashMap<i64, ArrayId> = self.arrays.iter().map(|a| (a.array_id, ArrayId(a.array_id))).collect();
        for array in self.arrays {
            state.insert_array(SwarmArray::new(ArrayId(array.array_id), array.array_name, array.max_concurrently_running));
        }

        let task_ids: std::collections::HashSet<i64> = self.tasks.iter().map(|t| t.task_id).collect();

        let mut tasks: HashMap<i64, SwarmTask> = HashMap::new();
        for fixture_task in &self.tasks {
            if !array_ids.contains_key(&fixture_task.array_id) {
                return Err(BootstrapError::UnknownArray {
                    task_id: fixture_task.task_id,
                    array_id: fixture_task.array_id,
                });
            }
            for &upstream in &fixture_task.upstreams {
                if !task_ids.contains(&upstream) {
                    return Err(BootstrapError::UnknownUpstream {
                        task_id: fixture_task.task_id,
                        upstream_id: upstream,
                    });
                }
            }

            let resources = crate::domain::models::TaskResources::new(
                fixture_task.requested_resources.clone(),
                QueueId(fixture_task.queue_id),
            );
            let mut task = SwarmTask::new(
                TaskId(fixture_task.task_id),
                ArrayId(fixture_task.array_id),
                ClusterId(fixture_task.cluster_id),
                resources,
            );
            task.max_attempts = fixture_task.max_attempts;
            task.num_upstreams = u32::try_from(fixture_task.upstreams.len()).unwrap_or(u32::MAX);
            tasks.insert(fixture_task.task_id, task);
        }

        for fixture_task in &self.tasks {
            for &upstream in &fixture_task.upstreams {
                if let Some(upstream_task) = tasks.get_mut(&upstream) {
                    upstream_task.downstream_swarm_tasks.insert(TaskId(fixture_task.task_id));
                }
            }
        }

        for (_, task) in tasks {
            if let Some(array) = state.arrays.get_mut(&task.array_id) {
                array.tasks.insert(task.task_id);
            }
            state.insert_task(task);
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_state_with_upstream_edges() {
        let fixture = WorkflowFixture {
            workflow_run_id: 1,
            workflow_id: 1,
            max_concurrently_running: 10,
            arrays: vec![FixtureArray { array_id: 1, array_name: "a".into(), max_concurrently_running: 10 }],
            tasks: vec![
                FixtureTask {
                    task_id: 1,
                    array_id: 1,
                    cluster_id: 1,
                    queue_id: 1,
                    requested_resources: ResourceMap::new(),
                    upstreams: vec![],
                    max_attempts: 3,
                },
                FixtureTask {
                    task_id: 2,
                    array_id: 1,
                    cluster_id: 1,
                    queue_id: 1,
                    requested_resources: ResourceMap::new(),
                    upstreams: vec![1],
                    max_attempts: 3,
                },
            ],
        };

        let state = fixture.into_state().unwrap();
        assert_eq!(state.tasks.len(), 2);
        let upstream_task = &state.tasks[&TaskId(1)];
        assert!(upstream_task.downstream_swarm_tasks.contains(&TaskId(2)));
        let downstream_task = &state.tasks[&TaskId(2)];
        assert_eq!(downstream_task.num_upstreams, 1);
        assert_eq!(downstream_task.num_upstreams_done, 0);
    }

    #[test]
    fn rejects_unknown_array() {
        let fixture = WorkflowFixture {
            workflow_run_id: 1,
            workflow_id: 1,
            max_concurrently_running: 10,
            arrays: vec![],
            tasks: vec![FixtureTask {
                task_id: 1,
                array_id: 99,
                cluster_id: 1,
                queue_id: 1,
                requested_resources: ResourceMap::new(),
                upstreams: vec![],
                max_attempts: 3,
            }],
        };
        assert!(matches!(fixture.into_state(), Err(BootstrapError::UnknownArray { .. })));
    }
}
