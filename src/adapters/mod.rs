//! Adapters: concrete implementations of the `domain::ports` traits.

pub mod distributor_probe;
pub mod gateway_http;

pub use distributor_probe::PidDistributorProbe;
pub use gateway_http::HttpGateway;
