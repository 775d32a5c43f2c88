//! Propagation: turning a set of changed task ids into downstream
//! readiness, resource (re)validation, and `ready_to_run` enqueues
//! (spec §4.5 step 5, §3 "Propagation soundness").

use std::collections::HashSet;

use crate::domain::error::ResourceError;
use crate::domain::models::{ResourceMapOverride, SwarmState, TaskId, TaskResources, TaskStatus};

/// Validate (and, if present, apply) a task's `compute_resources_callable`
/// exactly once, coerce the result, and intern it into the shared cache.
/// No-op if `task_id` is no longer present.
pub fn set_validated_task_resources(state: &mut SwarmState, task_id: TaskId) -> Result<(), ResourceError> {
    let Some(task) = state.tasks.get(&task_id) else {
        return Ok(());
    };

    let mut task_resources = task.current_task_resources.clone();
    if let Some(callable) = task.compute_resources_callable.clone() {
        match callable() {
            Some(ResourceMapOverride::Map(overrides)) => {
                let mut requested = task_resources.requested_resources.clone();
                requested.extend(overrides);
                task_resources = TaskResources::new(requested, task_resources.queue);
            }
            Some(ResourceMapOverride::Invalid) => {
                return Err(ResourceError::CallableReturnedInvalidObject { task_id });
            }
            None => {}
        }
    }

    let validated = task_resources.coerce_resources();
    let interned = state.task_resources_cache.intern(validated);

    if let Some(task) = state.tasks.get_mut(&task_id) {
        task.current_task_resources = interned;
        task.compute_resources_callable = None;
    }
    Ok(())
}

/// Scale a task's resources after a failed attempt, per its
/// `resource_scales`/`fallback_queues`, and advance its adjustment
/// counter so a `ResourceScale::Sequence` steps forward next time.
pub fn set_adjusted_task_resources(state: &mut SwarmState, task_id: TaskId) {
    let Some(task) = state.tasks.get(&task_id) else {
        return;
    };
    let adjusted = task.current_task_resources.adjust_resources(
        &task.resource_scales,
        &task.fallback_queues,
        task.adjustment_attempts,
    );
    let interned = state.task_resources_cache.intern(adjusted);

    if let Some(task) = state.tasks.get_mut(&task_id) {
        task.current_task_resources = interned;
        task.adjustment_attempts += 1;
    }
}

/// Re-bucket and propagate every task whose status actually changed this
/// tick. Returns the counts of newly-completed/newly-failed tasks purely
/// for logging; callers don't need them.
pub fn propagate_changed_tasks(state: &mut SwarmState, changed: HashSet<TaskId>) -> Result<(u32, u32), ResourceError> {
    let mut newly_completed = 0u32;
    let mut newly_failed = 0u32;

    for task_id in changed {
        let Some(task) = state.tasks.get(&task_id) else {
            continue;
        };
        let status = task.status;

        match status {
            TaskStatus::Done => {
                newly_completed += 1;
                state.n_executions += 1;
                let downstream_ids: Vec<TaskId> = task.downstream_swarm_tasks.iter().copied().collect();
                for downstream_id in downstream_ids {
                    let ready = if let Some(downstream) = state.tasks.get_mut(&downstream_id) {
                        downstream.record_upstream_done();
                        downstream.all_upstreams_done()
                    } else {
                        false
                    };
                    if ready {
                        set_validated_task_resources(state, downstream_id)?;
                        state.ready_to_run.push_back(downstream_id);
                    }
                }
            }
            TaskStatus::ErrorFatal => {
                newly_failed += 1;
            }
            TaskStatus::Registering if task.all_upstreams_done() => {
                set_validated_task_resources(state, task_id)?;
                state.ready_to_run.push_back(task_id);
            }
            TaskStatus::AdjustingResources => {
                set_adjusted_task_resources(state, task_id);
                // Front of queue: this task already used up one attempt.
                state.ready_to_run.push_front(task_id);
            }
            _ => {
                tracing::debug!(task_id = %task_id, %status, "status update needs no action");
            }
        }
    }

    if newly_completed > 0 {
        let total = state.tasks.len();
        let done = state.done_count();
        let percent_done = if total > 0 { (done as f64 / total as f64) * 100.0 } else { 0.0 };
        tracing::info!(newly_completed, percent_done, done, total, "workflow progress");
    }
    if newly_failed > 0 {
        tracing::warn!(newly_failed, "newly failed tasks");
    }

    Ok((newly_completed, newly_failed))
}
