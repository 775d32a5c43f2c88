//! Services: the business-logic layer sitting between domain models and
//! the Gateway/DistributorProbe ports (spec §4).

pub mod heartbeat;
pub mod orchestrator;
pub mod scheduler;
pub mod synchronizer;

pub use heartbeat::{HeartbeatHandle, HeartbeatService};
pub use orchestrator::{LoopOutcome, Orchestrator, OrchestratorConfig, OrchestratorResult};
pub use scheduler::Scheduler;
pub use synchronizer::Synchronizer;
