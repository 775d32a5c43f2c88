//! Configuration loading (SPEC_FULL §3.3), layered the teacher's way:
//! programmatic defaults, then project YAML, then environment overrides.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
