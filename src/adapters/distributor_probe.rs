//! Process-liveness [`DistributorProbe`], grounded on the teacher's
//! `adapters::substrates::claude_code` process-lifecycle handling (it
//! shells out to `kill` for termination; this probe uses the `nix` crate
//! directly for the read-only liveness check `kill(pid, 0)` performs).

use nix::sys::signal::kill;
use nix::unistd::Pid;

use crate::domain::ports::distributor::DistributorProbe;

/// Checks whether a PID is alive by sending signal `0`, which the kernel
/// validates without actually signaling the process. Returns `false` for
/// both "process gone" (`ESRCH`) and "exists but owned by another user"
/// (`EPERM`) being indistinguishable from this process's perspective is
/// treated as dead, since a distributor this process cannot see isn't one
/// it can coordinate with.
pub struct PidDistributorProbe {
    pid: i32,
}

impl PidDistributorProbe {
    #[must_use]
    pub const fn new(pid: i32) -> Self {
        Self { pid }
    }
}

impl DistributorProbe for PidDistributorProbe {
    fn is_alive(&self) -> bool {
        kill(Pid::from_raw(self.pid), None).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        let probe = PidDistributorProbe::new(std::process::id() as i32);
        assert!(probe.is_alive());
    }

    #[test]
    fn implausible_pid_is_not_alive() {
        // PID 2^30 is outside any realistic PID range on Linux (max_pid
        // defaults to 2^22) and should never exist.
        let probe = PidDistributorProbe::new(1 << 30);
        assert!(!probe.is_alive());
    }
}
