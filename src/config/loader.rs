//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply the deployment environment on top of file configuration.
///
/// Ports replace only the port half of the configured bind addresses.
/// Unparseable ports are left for validation to report.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(name) = lookup("SERVICE_NAME") {
        config.registry.service_name = name;
    }
    if let Some(ip) = lookup("POD_IP") {
        config.registry.pod_ip = ip;
    }
    if let Some(pod) = lookup("POD_NAME") {
        config.registry.pod_name = pod;
    }
    if let Some(kind) = lookup("REGISTRY_TYPE") {
        config.registry.kind = kind.to_lowercase();
    }
    if let Some(port) = lookup("HTTP_PORT") {
        config.http.bind_address = with_port(&config.http.bind_address, &port);
    }
    if let Some(port) = lookup("WEBSOCKET_PORT") {
        config.websocket.bind_address = with_port(&config.websocket.bind_address, &port);
    }
    if let Some(port) = lookup("GRPC_PORT") {
        match port.parse() {
            Ok(port) => config.registry.grpc_port = port,
            Err(_) => tracing::warn!(value = %port, "Ignoring invalid GRPC_PORT"),
        }
    }
}

fn with_port(bind_address: &str, port: &str) -> String {
    let host = bind_address
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or("0.0.0.0");
    format!("{}:{}", host, port)
}
