use super::{ConfigError, GatewayConfig};
use crate::constants::DEFAULT_CONFIG_PATH;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

/// Loads the gateway configuration from a YAML file, then applies environment overrides
///
/// # Arguments
///
/// * `file_path` - Explicit configuration path. When `None`, `config/config.yaml`
///   is used if it exists and built-in defaults otherwise.
///
/// # Errors
///
/// Returns an error if:
/// * An explicitly requested file cannot be read
/// * The YAML content cannot be parsed into a GatewayConfig
/// * An environment override holds an unusable value
pub fn load_config(file_path: Option<&str>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match file_path {
        Some(path) => read_file(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => read_file(DEFAULT_CONFIG_PATH)?,
        None => {
            info!("No configuration file found, using defaults");
            GatewayConfig::default()
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

fn read_file(path: &str) -> Result<GatewayConfig, ConfigError> {
    let yaml_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    let config: GatewayConfig = serde_yaml::from_str(&yaml_str)?;
    info!("Loaded configuration from {}", path);
    Ok(config)
}

/// Lets container deployments inject connection settings without editing files.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(port) = var("APP_PORT") {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("APP_PORT '{}' is not a port", port)))?;
    }
    if let Some(path) = var("DATABASE_PATH") {
        config.database.path = path;
    }
    if let Some(url) = var("TRADING_SERVICE_URL") {
        config.provider.base_url = url;
    }
    if let Some(raw) = lookup("FRONTEND_ORIGINS").filter(|v| !v.is_empty()) {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        config.server.frontend_origins = if origins.is_empty() {
            vec!["*".to_string()]
        } else {
            origins
        };
    }
    if let Some(raw) = var("RECONCILE_MAX_FAILURES") {
        match raw.trim().parse::<u32>() {
            Ok(n) => config.reconcile.max_consecutive_failures = n,
            Err(_) => warn!("Ignoring RECONCILE_MAX_FAILURES '{}': not a number", raw),
        }
    }
    if let Some(url) = var("GATEWAY_URL") {
        config.client.gateway_url = url;
    }
    if let Some(token) = var("GATEWAY_TOKEN") {
        config.client.token = Some(token);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let yaml = r#"
provider:
  base_url: http://analysis:8001
  timeout: 30s
reconcile:
  max_consecutive_failures: 5
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.provider.base_url, "http://analysis:8001");
        assert_eq!(config.provider.timeout, Duration::from_secs(30));
        assert_eq!(config.provider.api_prefix, "/api/v1");
        assert_eq!(config.provider.health_timeout, Duration::from_secs(5));
        assert_eq!(config.reconcile.max_consecutive_failures, 5);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn rejects_bad_durations() {
        let yaml = "provider:\n  timeout: soon\n";
        assert!(serde_yaml::from_str::<GatewayConfig>(yaml).is_err());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("APP_PORT", "8080"),
                ("DATABASE_PATH", "/data/gateway.db"),
                ("TRADING_SERVICE_URL", "http://trading:8001"),
                ("FRONTEND_ORIGINS", " https://a.example , ,https://b.example"),
                ("RECONCILE_MAX_FAILURES", "7"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, "/data/gateway.db");
        assert_eq!(config.provider.base_url, "http://trading:8001");
        assert_eq!(
            config.server.frontend_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.reconcile.max_consecutive_failures, 7);
    }

    #[test]
    fn blank_origin_list_means_any_origin() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, env(&[("FRONTEND_ORIGINS", " , ")])).unwrap();
        assert_eq!(config.server.frontend_origins, vec!["*"]);
    }

    #[test]
    fn invalid_port_is_an_error() {
        let mut config = GatewayConfig::default();
        assert!(apply_env_overrides(&mut config, env(&[("APP_PORT", "http")])).is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        assert!(matches!(
            load_config(Some("/definitely/not/here.yaml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
