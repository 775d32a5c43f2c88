//! Domain models for the swarm core.

pub mod array;
pub mod config;
pub mod ids;
pub mod resources;
pub mod state;
pub mod state_update;
pub mod status;
pub mod task;

pub use array::SwarmArray;
pub use config::{GatewayConfig, LogFormat, LoggingConfig, SwarmConfig};
pub use ids::{ArrayId, ClusterId, QueueId, TaskId};
pub use resources::{ResourceMap, ResourceScale, ResourceValue, TaskResources, TaskResourcesCache};
pub use state::{ReadyQueue, SwarmState};
pub use state_update::StateUpdate;
pub use status::{TaskStatus, WorkflowRunStatus};
pub use task::{ComputeResourcesCallable, ResourceMapOverride, SwarmTask};
