//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacities > 0, addresses parse)
//! - Reject registry backends the gateway cannot drive
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// Registry backends compiled into this gateway.
pub const SUPPORTED_REGISTRIES: &[&str] = &["static"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a fully loaded configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.http.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "http.bind_address",
            format!("invalid socket address '{}'", config.http.bind_address),
        ));
    }
    if config.websocket.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "websocket.bind_address",
            format!("invalid socket address '{}'", config.websocket.bind_address),
        ));
    }
    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::new("http.request_timeout_secs", "must be > 0"));
    }

    let ws = &config.websocket;
    if ws.queue_capacity == 0 {
        errors.push(ValidationError::new("websocket.queue_capacity", "must be > 0"));
    }
    if ws.outbound_capacity == 0 {
        errors.push(ValidationError::new("websocket.outbound_capacity", "must be > 0"));
    }
    if ws.heartbeat_interval_secs == 0 {
        errors.push(ValidationError::new("websocket.heartbeat_interval_secs", "must be > 0"));
    }
    if ws.write_deadline_secs == 0 {
        errors.push(ValidationError::new("websocket.write_deadline_secs", "must be > 0"));
    }
    if ws.max_frame_bytes < 4 {
        errors.push(ValidationError::new("websocket.max_frame_bytes", "must fit the 4-byte header"));
    }

    let pool = &config.pool;
    if pool.max_conns == 0 {
        errors.push(ValidationError::new("pool.max_conns", "must be > 0"));
    }
    if pool.reap_interval_secs == 0 {
        errors.push(ValidationError::new("pool.reap_interval_secs", "must be > 0"));
    }
    if pool.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("pool.connect_timeout_secs", "must be > 0"));
    }

    if config.rpc.timeout_secs == Some(0) {
        errors.push(ValidationError::new("rpc.timeout_secs", "must be > 0 when set"));
    }

    if config.circuit_breaker.enabled && config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be > 0"));
    }

    if !SUPPORTED_REGISTRIES.contains(&config.registry.kind.as_str()) {
        errors.push(ValidationError::new(
            "registry.kind",
            format!("unsupported registry type '{}'", config.registry.kind),
        ));
    }
    for instance in &config.registry.instances {
        if instance.name.is_empty() || instance.ip.is_empty() || instance.port == 0 {
            errors.push(ValidationError::new(
                "registry.instances",
                format!("instance '{}' needs a name, ip and port", instance.id),
            ));
        }
    }

    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            "expected 'pretty' or 'json'",
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
