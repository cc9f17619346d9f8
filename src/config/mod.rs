//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: SERVICE_NAME, POD_IP, *_PORT, ...)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → owned by the Gateway context, sections cloned into subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BalancerConfig, CircuitBreakerConfig, GatewayConfig, HttpConfig, ObservabilityConfig,
    PoolConfig, RegistryConfig, RpcConfig, SchemaConfig, WebSocketConfig,
};
