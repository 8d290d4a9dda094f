//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Environment variables that override file settings.
pub const ENV_SERVICE_B_URL: &str = "SERVICE_B_URL";
pub const ENV_SERVICE_C_URL: &str = "SERVICE_C_URL";
pub const ENV_SERVICE_NAME: &str = "SERVICE_NAME";
pub const ENV_BIND_ADDRESS: &str = "BIND_ADDRESS";
pub const ENV_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Load configuration: optional TOML file, then environment overrides,
/// then validation.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => ServiceConfig::default(),
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML document; missing sections fall back to defaults.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply environment overrides. Empty values are ignored.
pub fn apply_env_overrides<F>(mut config: ServiceConfig, lookup: F) -> ServiceConfig
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(ENV_SERVICE_B_URL) {
        config.downstream.service_b_url = url;
    }
    if let Some(url) = get(ENV_SERVICE_C_URL) {
        config.downstream.service_c_url = url;
    }
    if let Some(name) = get(ENV_SERVICE_NAME) {
        config.observability.service_name = name;
    }
    if let Some(addr) = get(ENV_BIND_ADDRESS) {
        config.listener.bind_address = addr;
    }
    if let Some(endpoint) = get(ENV_OTLP_ENDPOINT) {
        config.observability.otlp_endpoint = Some(endpoint);
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;
    use std::collections::HashMap;

    #[test]
    fn test_parse_partial_document() {
        let config = parse_config(
            r#"
            [downstream]
            service_b_url = "http://127.0.0.1:3000"

            [timeouts]
            call_ms = 2500

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.downstream.service_b_url, "http://127.0.0.1:3000");
        assert_eq!(config.downstream.service_c_url, "http://service-c:5000");
        assert_eq!(config.timeouts.call_ms, 2500);
        assert_eq!(config.timeouts.request_ms, 60_000);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.service_name, "service-a");
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[timeouts]\ncall_ms = \"ten\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_SERVICE_B_URL, "http://b.internal:3000"),
            (ENV_SERVICE_C_URL, ""),
            (ENV_SERVICE_NAME, "service-a-canary"),
            (ENV_OTLP_ENDPOINT, "http://otel-collector:4317"),
        ]
        .into_iter()
        .collect();

        let config = apply_env_overrides(ServiceConfig::default(), |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.downstream.service_b_url, "http://b.internal:3000");
        assert_eq!(config.downstream.service_c_url, "http://service-c:5000");
        assert_eq!(config.observability.service_name, "service-a-canary");
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(
            config.observability.otlp_endpoint.as_deref(),
            Some("http://otel-collector:4317")
        );
    }

    #[test]
    fn test_validation_error_message() {
        let err = ConfigError::Validation(vec![
            ValidationError::EmptyServiceName,
            ValidationError::ZeroTimeout { field: "timeouts.call_ms" },
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: observability.service_name: must not be empty, \
             timeouts.call_ms: must be greater than zero"
        );
    }
}
