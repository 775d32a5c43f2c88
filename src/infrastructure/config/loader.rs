use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::SwarmConfig;

/// Configuration validation failures (spec §6.4 defaults, field bounds
/// implied by their use in the services layer).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid heartbeat_interval_secs: {0}. Must be positive")]
    InvalidHeartbeatInterval(f64),

    #[error("invalid heartbeat_report_by_buffer: {0}. Must be >= 1.0")]
    InvalidReportByBuffer(f64),

    #[error("invalid timeout_secs: 0. Must be positive")]
    InvalidTimeout,

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid gateway.base_url: empty")]
    EmptyGatewayBaseUrl,

    #[error(
        "invalid gateway backoff: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),
}

/// Loads [`SwarmConfig`] with hierarchical merging, mirroring the
/// teacher's `ConfigLoader` (defaults → project YAML → env overrides).
pub struct ConfigLoader;

impl ConfigLoader {
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `swarm.yaml` in the current directory, if present
    /// 3. `SWARM_*` environment variables (double-underscore nesting)
    pub fn load() -> Result<SwarmConfig> {
        let config: SwarmConfig = Figment::new()
            .merge(Serialized::defaults(SwarmConfig::default()))
            .merge(Yaml::file("swarm.yaml"))
            .merge(Env::prefixed("SWARM_").split("__"))
            .extract()
            .context("failed to extract swarm configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<SwarmConfig> {
        let config: SwarmConfig = Figment::new()
            .merge(Serialized::defaults(SwarmConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("SWARM_").split("__"))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &SwarmConfig) -> Result<(), ConfigError> {
        if config.heartbeat_interval_secs <= 0.0 {
            return Err(ConfigError::InvalidHeartbeatInterval(config.heartbeat_interval_secs));
        }
        if config.heartbeat_report_by_buffer < 1.0 {
            return Err(ConfigError::InvalidReportByBuffer(config.heartbeat_report_by_buffer));
        }
        if config.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.gateway.base_url.is_empty() {
            return Err(ConfigError::EmptyGatewayBaseUrl);
        }
        if config.gateway.initial_backoff_ms >= config.gateway.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.gateway.initial_backoff_ms,
                config.gateway.max_backoff_ms,
            ));
        }

        Ok(())
    }
}
