mod parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use parser::load_config;

use crate::constants::*;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure for the gateway
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GatewayConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// SQLite store settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// External analysis provider
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Reconciliation policy
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Settings used by the `analyze` client subcommand
    #[serde(default)]
    pub client: ClientConfig,
    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; `*` alone allows any origin without credentials
    pub frontend_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            frontend_origins: DEFAULT_FRONTEND_ORIGINS
                .iter()
                .map(|o| o.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: DEFAULT_DATABASE_PATH.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    /// Scheme, host and port of the analysis service
    pub base_url: String,
    /// Path prefix of the analyze/analysis endpoints; health lives outside it
    pub api_prefix: String,
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,
    #[serde(with = "humantime_duration")]
    pub health_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: DEFAULT_PROVIDER_URL.to_string(),
            api_prefix: DEFAULT_PROVIDER_PREFIX.to_string(),
            timeout: PROVIDER_TIMEOUT,
            health_timeout: PROVIDER_HEALTH_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Consecutive unreachable-provider polls before a task is marked failed
    pub max_consecutive_failures: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        ReconcileConfig {
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    pub gateway_url: String,
    pub token: Option<String>,
    #[serde(with = "humantime_duration")]
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            gateway_url: format!("http://{}:{}", DEFAULT_HOST_CLIENT, DEFAULT_PORT),
            token: None,
            poll_interval: CLIENT_POLL_INTERVAL,
            max_attempts: CLIENT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for daily rotating log files; stdout only when unset
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Durations written the humantime way, e.g. `15s` or `1m 30s`.
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
