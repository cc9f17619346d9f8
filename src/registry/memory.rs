//! In-process registry.
//!
//! Seeded from the static instance list in configuration. Also used by
//! tests to script discovery results.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::watch;

use crate::registry::{ConfigListener, Registry, RegistryError, ServiceInstance};

/// Registry held entirely in memory.
#[derive(Default)]
pub struct MemoryRegistry {
    /// Service name -> current snapshot, observable through `watch`.
    services: DashMap<String, watch::Sender<Vec<ServiceInstance>>>,
    /// (group, key) -> content.
    configs: DashMap<(String, String), String>,
    /// (group, key) -> change listeners.
    listeners: DashMap<(String, String), Vec<ConfigListener>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-populated with the given instances.
    pub fn with_instances(instances: impl IntoIterator<Item = ServiceInstance>) -> Self {
        let registry = Self::new();
        for instance in instances {
            registry.upsert(instance);
        }
        registry
    }

    /// Store configuration content and notify listeners.
    pub fn publish_config(&self, key: &str, group: &str, content: impl Into<String>) {
        let content = content.into();
        let slot = (group.to_string(), key.to_string());
        self.configs.insert(slot.clone(), content.clone());
        if let Some(listeners) = self.listeners.get(&slot) {
            for listener in listeners.iter() {
                listener(&content);
            }
        }
    }

    fn upsert(&self, instance: ServiceInstance) {
        let sender = self
            .services
            .entry(instance.name.clone())
            .or_insert_with(|| watch::channel(Vec::new()).0);
        sender.send_modify(|instances| {
            instances.retain(|existing| existing.id != instance.id);
            instances.push(instance);
        });
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn register(&self, instance: ServiceInstance) -> Result<(), RegistryError> {
        tracing::info!(
            service = %instance.name,
            id = %instance.id,
            address = %instance.address(),
            "Instance registered"
        );
        self.upsert(instance);
        Ok(())
    }

    async fn deregister(&self, instance: &ServiceInstance) -> Result<(), RegistryError> {
        let sender = self
            .services
            .get(&instance.name)
            .ok_or_else(|| RegistryError::NotFound(instance.name.clone()))?;
        sender.send_modify(|instances| instances.retain(|existing| existing.id != instance.id));
        tracing::info!(service = %instance.name, id = %instance.id, "Instance deregistered");
        Ok(())
    }

    async fn discover(&self, service: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        self.services
            .get(service)
            .map(|sender| sender.value().borrow().clone())
            .ok_or_else(|| RegistryError::NotFound(service.to_string()))
    }

    async fn watch(&self, service: &str) -> Result<watch::Receiver<Vec<ServiceInstance>>, RegistryError> {
        let sender = self
            .services
            .entry(service.to_string())
            .or_insert_with(|| watch::channel(Vec::new()).0);
        Ok(sender.subscribe())
    }

    async fn load_config(&self, key: &str, group: &str) -> Result<String, RegistryError> {
        self.configs
            .get(&(group.to_string(), key.to_string()))
            .map(|content| content.clone())
            .ok_or_else(|| RegistryError::NotFound(format!("{}/{}", group, key)))
    }

    async fn watch_config(&self, key: &str, group: &str, on_change: ConfigListener) -> Result<(), RegistryError> {
        self.listeners
            .entry((group.to_string(), key.to_string()))
            .or_default()
            .push(on_change);
        Ok(())
    }
}
