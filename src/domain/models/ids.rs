//! Opaque server-issued identifiers.
//!
//! The source keeps direct object references for DAG edges; per spec §9
//! ("DAG with downstream references → arena+index") this core stores
//! [`crate::domain::models::task::SwarmTask`] values in a map owned by
//! [`crate::domain::models::state::SwarmState`] and threads these newtyped
//! integer ids as the only cross-reference, eliminating ownership cycles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a [`crate::domain::models::task::SwarmTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Identifier of a [`crate::domain::models::array::SwarmArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArrayId(pub i64);

impl fmt::Display for ArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ArrayId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Identifier of a queue handle (opaque to the core).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueId(pub i64);

/// Identifier of a cluster handle (opaque to the core).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub i64);
