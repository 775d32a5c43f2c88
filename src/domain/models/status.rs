//! Task and workflow-run status codes.
//!
//! The wire representation is the single-letter code the server uses
//! (spec §6.1, §6.2); the in-process representation is a named enum so
//! the rest of the core never matches on bare characters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a single [`crate::domain::models::task::SwarmTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// `G` — task known, upstreams not all done.
    #[serde(rename = "G")]
    Registering,
    /// `Q` — server-accepted, awaiting dispatch.
    #[serde(rename = "Q")]
    Queued,
    /// `I` — distributor preparing to submit.
    #[serde(rename = "I")]
    Instantiating,
    /// `O` — submitted to batch scheduler.
    #[serde(rename = "O")]
    Launched,
    /// `R` — executing on a worker.
    #[serde(rename = "R")]
    Running,
    /// `D` — terminal success.
    #[serde(rename = "D")]
    Done,
    /// `A` — failed once, needs resource bump before re-queue.
    #[serde(rename = "A")]
    AdjustingResources,
    /// `F` — terminal failure.
    #[serde(rename = "F")]
    ErrorFatal,
}

impl TaskStatus {
    /// All statuses, used to pre-populate `task_status_map` buckets.
    pub const ALL: [TaskStatus; 8] = [
        TaskStatus::Registering,
        TaskStatus::Queued,
        TaskStatus::Instantiating,
        TaskStatus::Launched,
        TaskStatus::Running,
        TaskStatus::Done,
        TaskStatus::AdjustingResources,
        TaskStatus::ErrorFatal,
    ];

    /// Capacity-accounting "active" set: `{Q, I, O, R}`.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Queued | Self::Instantiating | Self::Launched | Self::Running
        )
    }

    /// Terminal set: `{D, F}`. Once terminal, a task may not transition
    /// further locally within this run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::ErrorFatal)
    }

    /// The single-letter wire code.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Registering => 'G',
            Self::Queued => 'Q',
            Self::Instantiating => 'I',
            Self::Launched => 'O',
            Self::Running => 'R',
            Self::Done => 'D',
            Self::AdjustingResources => 'A',
            Self::ErrorFatal => 'F',
        }
    }

    /// Parse a single-letter wire code.
    #[must_use]
    pub const fn from_code(code: char) -> Option<Self> {
        match code {
            'G' => Some(Self::Registering),
            'Q' => Some(Self::Queued),
            'I' => Some(Self::Instantiating),
            'O' => Some(Self::Launched),
            'R' => Some(Self::Running),
            'D' => Some(Self::Done),
            'A' => Some(Self::AdjustingResources),
            'F' => Some(Self::ErrorFatal),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Status of the workflow-run as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowRunStatus {
    /// `B` — initial state.
    #[serde(rename = "B")]
    Bound,
    /// `R` — executing.
    #[serde(rename = "R")]
    Running,
    /// `D` — all tasks done.
    #[serde(rename = "D")]
    Done,
    /// `E` — terminal error.
    #[serde(rename = "E")]
    Error,
    /// `T` — terminated after a resume/kill signal.
    #[serde(rename = "T")]
    Terminated,
    /// `S` — stopped by the server.
    #[serde(rename = "S")]
    Stopped,
    /// `C` — cold resume requested.
    #[serde(rename = "C")]
    ColdResume,
    /// `H` — hot resume requested.
    #[serde(rename = "H")]
    HotResume,
}

impl WorkflowRunStatus {
    /// Server-stop set: `{E, T, S}`. The server has already decided the
    /// run must stop; the core must not attempt further transitions.
    #[must_use]
    pub const fn is_server_stop(self) -> bool {
        matches!(self, Self::Error | Self::Terminated | Self::Stopped)
    }

    /// Terminating set: `{C, H}`. A resume/kill signal was delivered
    /// out-of-band via the heartbeat channel.
    #[must_use]
    pub const fn is_terminating(self) -> bool {
        matches!(self, Self::ColdResume | Self::HotResume)
    }

    /// The single-letter wire code.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Bound => 'B',
            Self::Running => 'R',
            Self::Done => 'D',
            Self::Error => 'E',
            Self::Terminated => 'T',
            Self::Stopped => 'S',
            Self::ColdResume => 'C',
            Self::HotResume => 'H',
        }
    }
}

impl fmt::Display for WorkflowRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_roundtrips_through_code() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::from_code(status.code()), Some(status));
        }
    }

    #[test]
    fn active_set_matches_spec() {
        assert!(TaskStatus::Queued.is_active());
        assert!(TaskStatus::Instantiating.is_active());
        assert!(TaskStatus::Launched.is_active());
        assert!(TaskStatus::Running.is_active());
        assert!(!TaskStatus::Registering.is_active());
        assert!(!TaskStatus::Done.is_active());
        assert!(!TaskStatus::AdjustingResources.is_active());
        assert!(!TaskStatus::ErrorFatal.is_active());
    }

    #[test]
    fn terminal_set_matches_spec() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::ErrorFatal.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    #[test]
    fn workflow_run_status_sets_match_spec() {
        assert!(WorkflowRunStatus::Error.is_server_stop());
        assert!(WorkflowRunStatus::Terminated.is_server_stop());
        assert!(WorkflowRunStatus::Stopped.is_server_stop());
        assert!(!WorkflowRunStatus::Running.is_server_stop());

        assert!(WorkflowRunStatus::ColdResume.is_terminating());
        assert!(WorkflowRunStatus::HotResume.is_terminating());
        assert!(!WorkflowRunStatus::Running.is_terminating());
    }

    #[test]
    fn serializes_to_single_letter_code() {
        let json = serde_json::to_string(&TaskStatus::Queued).unwrap();
        assert_eq!(json, "\"Q\"");
        let json = serde_json::to_string(&WorkflowRunStatus::ColdResume).unwrap();
        assert_eq!(json, "\"C\"");
    }
}
