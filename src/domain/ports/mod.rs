//! Domain ports (interfaces) the swarm core consumes.

pub mod distributor;
pub mod gateway;

pub use distributor::DistributorProbe;
pub use gateway::{
    BindTaskResourcesResponse, Gateway, HeartbeatResponse, QueueTaskBatchResponse,
    TaskStatusUpdatesResponse, UpdateStatusResponse,
};
