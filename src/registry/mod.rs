//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! Backend process starts
//!     → Registry::register(instance)
//!
//! Gateway request/message
//!     → Registry::discover(service)   (fresh snapshot per call, never cached)
//!     → load_balancer selects one instance
//!
//! Long-lived observers
//!     → Registry::watch(service)      (snapshot stream)
//!     → Registry::watch_config(key, group, callback)
//! ```
//!
//! # Design Decisions
//! - The gateway only consumes the trait; etcd/Nacos backends live elsewhere
//! - Instances are immutable snapshots, replaced wholesale on change
//! - Service-name suffixing and replication are registry concerns

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

pub use memory::MemoryRegistry;

/// A discovered backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceInstance {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub service_host: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
}

impl ServiceInstance {
    pub fn new(id: impl Into<String>, name: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: String::new(),
            ip: ip.into(),
            port,
            service_host: None,
            metadata: HashMap::new(),
            cluster_name: None,
            group_name: None,
        }
    }

    /// Network address in `ip:port` form.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// Errors reported by registry backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Callback invoked with new configuration content.
pub type ConfigListener = Box<dyn Fn(&str) + Send + Sync>;

/// Registry collaborator consumed by the gateway.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn register(&self, instance: ServiceInstance) -> Result<(), RegistryError>;

    async fn deregister(&self, instance: &ServiceInstance) -> Result<(), RegistryError>;

    /// Momentary, possibly stale snapshot of a service's instances.
    async fn discover(&self, service: &str) -> Result<Vec<ServiceInstance>, RegistryError>;

    /// Stream of snapshots, starting with the current one.
    async fn watch(&self, service: &str) -> Result<watch::Receiver<Vec<ServiceInstance>>, RegistryError>;

    async fn load_config(&self, key: &str, group: &str) -> Result<String, RegistryError>;

    async fn watch_config(&self, key: &str, group: &str, on_change: ConfigListener) -> Result<(), RegistryError>;
}
