//! `DistributorProbe`: the liveness check the Orchestrator calls once per
//! main-loop iteration (spec §4.5 step 2, §5 point 1).

/// Probes whether the distributor process backing this workflow run is
/// still alive. The probe is a blocking host call in the source system
/// (a process/PID check); implementations should expect to be invoked
/// off the async executor (the Orchestrator dispatches it via
/// `spawn_blocking`) and must not assume a Tokio context.
pub trait DistributorProbe: Send + Sync {
    /// Returns true if the distributor is alive.
    fn is_alive(&self) -> bool;
}
