use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `PLAYERFORGE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Tuning for the membership sync engine.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Upper bound on one player sync before it is abandoned and queued
    /// for retry.
    #[serde(default = "default_sync_timeout_ms")]
    pub timeout_ms: u64,
    /// Capacity of the failed-sync retry queue; the oldest entry is dropped
    /// when full.
    #[serde(default = "default_retry_capacity")]
    pub retry_capacity: usize,
    /// Interval at which the retry queue is drained.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

fn default_node_id() -> String {
    "playerforge-1".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_sync_timeout_ms() -> u64 {
    5_000
}
fn default_retry_capacity() -> usize {
    10_000
}
fn default_retry_interval_ms() -> u64 {
    30_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_sync_timeout_ms(),
            retry_capacity: default_retry_capacity(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("PLAYERFORGE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
