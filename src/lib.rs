//! Per-workflow-run swarm coordinator: a DAG state machine driven by a
//! heartbeat/sync/schedule main loop against a remote job-tracking server.
//!
//! Layered the teacher's way: `domain` (models + ports + errors) has no
//! I/O; `services` implements the core algorithms against the `domain`
//! ports; `adapters` implements those ports over real transports;
//! `infrastructure` is the ambient config/logging/bootstrap plumbing the
//! binary needs and the library itself does not depend on.

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;
