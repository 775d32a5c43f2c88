//! `SwarmArray`: a group of tasks sharing a template and a concurrency cap.

use std::collections::HashSet;

use super::ids::{ArrayId, TaskId};

/// Group of tasks sharing a template and an independent concurrency cap.
/// The cap may be revised by the server mid-run via a
/// [`crate::domain::models::state_update::StateUpdate::array_limits`] entry.
#[derive(Debug, Clone)]
pub struct SwarmArray {
    pub array_id: ArrayId,
    pub array_name: String,
    pub max_concurrently_running: u32,
    pub tasks: HashSet<TaskId>,
}

impl SwarmArray {
    #[must_use]
    pub fn new(array_id: ArrayId, array_name: impl Into<String>, max_concurrently_running: u32) -> Self {
        Self {
            array_id,
            array_name: array_name.into(),
            max_concurrently_running,
            tasks: HashSet::new(),
        }
    }
}
