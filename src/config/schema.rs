//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::load_balancer::Strategy;
use crate::registry::ServiceInstance;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP API listener.
    pub http: HttpConfig,

    /// WebSocket listener and session tuning.
    pub websocket: WebSocketConfig,

    /// Outbound connection pool settings.
    pub pool: PoolConfig,

    /// Instance selection strategy.
    pub balancer: BalancerConfig,

    /// Backend call settings.
    pub rpc: RpcConfig,

    /// Circuit breaker for the WebSocket dispatch path.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Service registry settings.
    pub registry: RegistryConfig,

    /// Protobuf schema source.
    pub schema: SchemaConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (read + dispatch + write) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 10,
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

/// WebSocket listener and session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Bind address (e.g., "0.0.0.0:8081").
    pub bind_address: String,

    /// Frames buffered between the reader and the dispatcher.
    pub queue_capacity: usize,

    /// Interval between heartbeat pings in seconds.
    pub heartbeat_interval_secs: u64,

    /// Deadline for a single frame write in seconds.
    pub write_deadline_secs: u64,

    /// Deadline for the normal-closure frame sent at shutdown.
    pub close_deadline_secs: u64,

    /// Largest accepted inbound message in bytes.
    pub max_frame_bytes: usize,

    /// Broadcast/close commands buffered per session.
    pub outbound_capacity: usize,

    /// Answer failed dispatches with an error envelope instead of dropping.
    pub send_error_frames: bool,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
            queue_capacity: 100,
            heartbeat_interval_secs: 30,
            write_deadline_secs: 5,
            close_deadline_secs: 1,
            max_frame_bytes: 4 * 1024 * 1024,
            outbound_capacity: 64,
            send_error_frames: false,
        }
    }
}

impl WebSocketConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn write_deadline(&self) -> Duration {
        Duration::from_secs(self.write_deadline_secs)
    }

    pub fn close_deadline(&self) -> Duration {
        Duration::from_secs(self.close_deadline_secs)
    }
}

/// Connection pool configuration, applied to every per-service pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum connections held by one pool.
    pub max_conns: usize,

    /// Idle horizon after which the reaper closes a connection, in seconds.
    pub max_idle_secs: u64,

    /// Reaper period in seconds.
    pub reap_interval_secs: u64,

    /// Dial timeout in seconds.
    pub connect_timeout_secs: u64,

    /// TCP and HTTP/2 keep-alive interval in seconds.
    pub keepalive_secs: u64,

    /// HTTP/2 keep-alive ack timeout in seconds.
    pub keepalive_timeout_secs: u64,

    /// Maximum encoded/decoded message size in bytes.
    pub max_message_bytes: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_conns: 100,
            max_idle_secs: 30 * 60,
            reap_interval_secs: 5 * 60,
            connect_timeout_secs: 5,
            keepalive_secs: 30,
            keepalive_timeout_secs: 10,
            max_message_bytes: 16 * 1024 * 1024,
        }
    }
}

impl PoolConfig {
    pub fn max_idle(&self) -> Duration {
        Duration::from_secs(self.max_idle_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(self.keepalive_timeout_secs)
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    pub strategy: Strategy,
}

/// Backend call configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Per-call deadline in seconds. Unset means the caller's context and
    /// the transport decide.
    pub timeout_secs: Option<u64>,
}

impl RpcConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,

    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Time an open circuit waits before admitting a probe, in seconds.
    pub recovery_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            failure_threshold: 5,
            recovery_timeout_secs: 30,
        }
    }
}

/// Service registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry backend. Only "static" ships with the gateway.
    pub kind: String,

    /// Name the gateway registers itself under (empty = no self-registration).
    pub service_name: String,

    /// Address advertised for self-registration.
    pub pod_ip: String,

    /// Instance id advertised for self-registration.
    pub pod_name: String,

    /// Port advertised for self-registration.
    pub grpc_port: u16,

    /// Backend instances known up front.
    pub instances: Vec<ServiceInstance>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            kind: "static".to_string(),
            service_name: String::new(),
            pod_ip: "127.0.0.1".to_string(),
            pod_name: String::new(),
            grpc_port: 9000,
            instances: Vec::new(),
        }
    }
}

/// Protobuf schema configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Path to a serialized `FileDescriptorSet`.
    pub descriptor_set: Option<String>,

    /// Registry service name -> fully-qualified protobuf service name.
    pub aliases: HashMap<String, String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when RUST_LOG is unset.
    pub log_level: String,

    /// "pretty" or "json".
    pub log_format: String,

    pub metrics_enabled: bool,

    /// Prometheus scrape address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "game_gateway=info,tower_http=info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
