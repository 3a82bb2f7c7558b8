use std::time::Duration;

/// Configuration file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Host the `analyze` client talks to by default
pub const DEFAULT_HOST_CLIENT: &str = "localhost";

pub const DEFAULT_PORT: u16 = 3000;

pub const DEFAULT_FRONTEND_ORIGINS: &[&str] = &["http://localhost:5173", "http://localhost:8080"];

pub const DEFAULT_DATABASE_PATH: &str = "trading-gateway.db";

pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

pub const DEFAULT_PROVIDER_URL: &str = "http://localhost:8001";

pub const DEFAULT_PROVIDER_PREFIX: &str = "/api/v1";

/// Timeout for submit and status calls to the provider
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

pub const PROVIDER_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Unreachable-provider polls tolerated before a task is marked failed
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Number of tasks returned by the listing endpoint
pub const RECENT_TASKS_LIMIT: i64 = 20;

pub const MAX_TICKER_LEN: usize = 10;

pub const CLIENT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub const CLIENT_MAX_ATTEMPTS: u32 = 120;
