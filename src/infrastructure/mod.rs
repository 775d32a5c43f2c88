//! Ambient infrastructure: configuration loading, logging setup, and the
//! fixture loader the `run` binary uses to seed a manual test.

pub mod bootstrap;
pub mod config;
pub mod logging;
