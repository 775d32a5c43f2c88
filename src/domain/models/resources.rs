//! Task resource requests: the value type the scheduler batches on and the
//! server binds to a persisted id.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::ids::QueueId;

/// A single resource value (cores, memory, runtime, ...). Kept as an enum
/// rather than a raw `f64` map value so equality/hash are exact: floats are
/// compared and hashed via their bit pattern, which is fine here because
/// resource values are never computed, only copied/scaled and then
/// compared for cache-key equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl PartialEq for ResourceValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for ResourceValue {}

impl Hash for ResourceValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Int(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            Self::Float(v) => {
                1u8.hash(state);
                v.to_bits().hash(state);
            }
            Self::Text(v) => {
                2u8.hash(state);
                v.hash(state);
            }
        }
    }
}

impl ResourceValue {
    /// Scale a numeric resource value by `factor`, leaving text values
    /// untouched (queues, partitions, and similar non-scalable overrides
    /// flow through `fallback_queues` instead).
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        match self {
            Self::Int(v) => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
                let scaled = (*v as f64 * factor).ceil() as i64;
                Self::Int(scaled)
            }
            Self::Float(v) => Self::Float(v * factor),
            Self::Text(v) => Self::Text(v.clone()),
        }
    }
}

/// An ordered, deterministically-hashable resource request map.
pub type ResourceMap = BTreeMap<String, ResourceValue>;

/// A scale factor applied to a named resource on resource adjustment. The
/// server may supply either a single factor or a finite sequence of
/// factors to step through across successive adjustments (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceScale {
    Single(f64),
    Sequence(Vec<f64>),
}

impl ResourceScale {
    /// The factor to apply for the `attempt`-th adjustment (0-indexed).
    /// A sequence clamps to its last entry once exhausted.
    #[must_use]
    pub fn factor_for_attempt(&self, attempt: usize) -> f64 {
        match self {
            Self::Single(f) => *f,
            Self::Sequence(factors) => {
                if factors.is_empty() {
                    1.0
                } else {
                    factors[attempt.min(factors.len() - 1)]
                }
            }
        }
    }
}

/// A task's requested compute resources, consumed as a value type.
///
/// Hashable and comparable by value so that many tasks requesting
/// identical resources can share one bound handle via
/// [`crate::domain::models::state::SwarmState::task_resources_cache`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskResources {
    pub requested_resources: ResourceMap,
    pub queue: QueueId,
    pub is_bound: bool,
    pub id: Option<i64>,
}

impl TaskResources {
    #[must_use]
    pub fn new(requested_resources: ResourceMap, queue: QueueId) -> Self {
        Self {
            requested_resources,
            queue,
            is_bound: false,
            id: None,
        }
    }

    /// Idempotent normalization: applying this twice yields the same
    /// value. This core's normalization is limited to what the Non-goals
    /// leave to us — resource coercion arithmetic and queue validation
    /// live in the external cluster-plugin layer this core only consumes
    /// via [`Self::adjust_resources`]'s caller; here "coerce" means
    /// dropping resources with non-positive numeric values, which are
    /// never meaningful requests.
    #[must_use]
    pub fn coerce_resources(&self) -> Self {
        let requested_resources = self
            .requested_resources
            .iter()
            .filter(|(_, v)| match v {
                ResourceValue::Int(n) => *n > 0,
                ResourceValue::Float(n) => *n > 0.0,
                ResourceValue::Text(_) => true,
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            requested_resources,
            queue: self.queue,
            is_bound: self.is_bound,
            id: self.id,
        }
    }

    /// Return a new, scaled variant after a failed attempt. Applies
    /// `resource_scales` to every named resource that has a scale entry;
    /// whenever `fallback_queues` is non-empty, switches to its first
    /// entry unconditionally (the queue swap does not depend on whether
    /// scaling changed anything). Never mutates `self`.
    #[must_use]
    pub fn adjust_resources(
        &self,
        resource_scales: &std::collections::HashMap<String, ResourceScale>,
        fallback_queues: &[QueueId],
        attempt: usize,
    ) -> Self {
        let mut requested_resources = self.requested_resources.clone();
        for (name, scale) in resource_scales {
            if let Some(value) = requested_resources.get(name) {
                let factor = scale.factor_for_attempt(attempt);
                requested_resources.insert(name.clone(), value.scaled(factor));
            }
        }

        let queue = fallback_queues.first().copied().unwrap_or(self.queue);

        Self {
            requested_resources,
            queue,
            is_bound: false,
            id: None,
        }
    }

    /// Mark this value as bound to a server-issued id. Used by the
    /// Scheduler after `bind_task_resources` returns.
    #[must_use]
    pub fn bound(&self, id: i64) -> Self {
        Self {
            requested_resources: self.requested_resources.clone(),
            queue: self.queue,
            is_bound: true,
            id: Some(id),
        }
    }
}

/// Keyed by the `TaskResources` hash so many tasks requesting identical
/// resources share one bound handle (spec §3).
#[derive(Debug, Default)]
pub struct TaskResourcesCache {
    entries: std::collections::HashMap<u64, TaskResources>,
}

impl TaskResourcesCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn hash_of(resources: &TaskResources) -> u64 {
        use std::hash::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        resources.hash(&mut hasher);
        hasher.finish()
    }

    /// Intern `resources`: if a value-equal entry already exists, return
    /// it; otherwise insert `resources` and return it back.
    pub fn intern(&mut self, resources: TaskResources) -> TaskResources {
        let key = Self::hash_of(&resources);
        self.entries.entry(key).or_insert(resources).clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
