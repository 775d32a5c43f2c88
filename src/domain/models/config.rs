//! Swarm core configuration (spec §6.4) plus the ambient knobs the
//! logging and Gateway subsystems need (SPEC_FULL §3.3).

use serde::{Deserialize, Serialize};

/// Top-level configuration for a swarm run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SwarmConfig {
    /// Period of Heartbeat ticks and the Orchestrator's sync cadence.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: f64,

    /// Multiplier applied to `heartbeat_interval_secs` when telling the
    /// server how long to wait before considering the run dead.
    #[serde(default = "default_heartbeat_report_by_buffer")]
    pub heartbeat_report_by_buffer: f64,

    /// Upper bound on the time between full syncs.
    #[serde(default = "default_wedged_sync_interval")]
    pub wedged_workflow_sync_interval_secs: f64,

    /// Abort on the first `ERROR_FATAL` task.
    #[serde(default)]
    pub fail_fast: bool,

    /// Hard wall-clock bound on the main loop, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Test hook: raise once `n_executions >= this`.
    #[serde(default)]
    pub fail_after_n_executions: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

const fn default_heartbeat_interval() -> f64 {
    30.0
}
const fn default_heartbeat_report_by_buffer() -> f64 {
    1.5
}
const fn default_wedged_sync_interval() -> f64 {
    600.0
}
const fn default_timeout() -> u64 {
    36000
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            heartbeat_report_by_buffer: default_heartbeat_report_by_buffer(),
            wedged_workflow_sync_interval_secs: default_wedged_sync_interval(),
            fail_fast: false,
            timeout_secs: default_timeout(),
            fail_after_n_executions: None,
            logging: LoggingConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Ambient logging configuration, matching the teacher's
/// `infrastructure::logging::config::LogConfig` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Ambient Gateway configuration: base URL and retry/backoff bounds for
/// the RPC surface in spec §4.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
const fn default_request_timeout() -> u64 {
    30
}
const fn default_max_retries() -> u32 {
    5
}
const fn default_initial_backoff_ms() -> u64 {
    200
}
const fn default_max_backoff_ms() -> u64 {
    10_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_6_4() {
        let config = SwarmConfig::default();
        assert!((config.heartbeat_interval_secs - 30.0).abs() < f64::EPSILON);
        assert!((config.heartbeat_report_by_buffer - 1.5).abs() < f64::EPSILON);
        assert!((config.wedged_workflow_sync_interval_secs - 600.0).abs() < f64::EPSILON);
        assert!(!config.fail_fast);
        assert_eq!(config.timeout_secs, 36000);
        assert_eq!(config.fail_after_n_executions, None);
    }

    #[test]
    fn deserializes_from_yaml_with_partial_overrides() {
        let yaml = "fail_fast: true\ntimeout_secs: 100\n";
        let config: SwarmConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.fail_fast);
        assert_eq!(config.timeout_secs, 100);
        // Unspecified fields still take their defaults.
        assert!((config.heartbeat_interval_secs - 30.0).abs() < f64::EPSILON);
    }
}
