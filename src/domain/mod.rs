//! Domain layer: models and ports, free of I/O and framework concerns.

pub mod error;
pub mod models;
pub mod ports;
