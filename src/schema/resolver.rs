//! `service.method` → message type resolution.

use std::collections::HashMap;
use std::path::Path;

use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, MethodDescriptor, ServiceDescriptor};

use crate::error::{GatewayError, GatewayResult};

/// A backend method resolved from its `service.method` name.
#[derive(Debug, Clone)]
pub struct ResolvedMethod {
    descriptor: MethodDescriptor,
}

impl ResolvedMethod {
    pub fn new(descriptor: MethodDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    pub fn input(&self) -> MessageDescriptor {
        self.descriptor.input()
    }

    pub fn output(&self) -> MessageDescriptor {
        self.descriptor.output()
    }

    /// Empty, mutable request message.
    pub fn new_request(&self) -> DynamicMessage {
        DynamicMessage::new(self.input())
    }

    /// Empty response message.
    pub fn new_response(&self) -> DynamicMessage {
        DynamicMessage::new(self.output())
    }

    /// gRPC path, `/{package.Service}/{Method}`.
    pub fn path(&self) -> String {
        format!(
            "/{}/{}",
            self.descriptor.parent_service().full_name(),
            self.descriptor.name()
        )
    }

    pub fn full_name(&self) -> &str {
        self.descriptor.full_name()
    }
}

/// Index of every known method, keyed case-insensitively by `service.method`.
///
/// Each method is reachable through the service's fully-qualified name, its
/// short name, the short name without a trailing `Service`, and any alias.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    pool: DescriptorPool,
    methods: HashMap<String, MethodDescriptor>,
}

impl SchemaRegistry {
    pub fn new(pool: DescriptorPool, aliases: &HashMap<String, String>) -> Self {
        let mut methods = HashMap::new();

        for service in pool.services() {
            for name in service_names(&service) {
                index_service(&mut methods, &name, &service);
            }
        }

        for (alias, target) in aliases {
            match pool.get_service_by_name(target) {
                Some(service) => index_service(&mut methods, alias, &service),
                None => tracing::warn!(alias = %alias, target = %target, "Alias points at unknown service"),
            }
        }

        tracing::debug!(
            services = pool.services().count(),
            keys = methods.len(),
            "Schema registry built"
        );
        Self { pool, methods }
    }

    /// Load a serialized `FileDescriptorSet` from disk.
    pub fn from_descriptor_file(path: &Path, aliases: &HashMap<String, String>) -> GatewayResult<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| GatewayError::Schema(format!("{}: {}", path.display(), e)))?;
        let pool = DescriptorPool::decode(bytes.as_slice())
            .map_err(|e| GatewayError::Schema(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(pool, aliases))
    }

    /// Registry with no methods; every resolution fails.
    pub fn empty() -> Self {
        Self::new(DescriptorPool::new(), &HashMap::new())
    }

    /// Resolve `service.method`. Surrounding slashes on `method` are ignored
    /// so HTTP path tails can be passed through as-is.
    pub fn resolve(&self, service: &str, method: &str) -> GatewayResult<ResolvedMethod> {
        let method = method.trim_matches('/');
        self.methods
            .get(&key(service, method))
            .cloned()
            .map(ResolvedMethod::new)
            .ok_or_else(|| GatewayError::UnknownMethod(format!("{}.{}", service, method)))
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// Number of lookup keys.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

fn key(service: &str, method: &str) -> String {
    format!("{}.{}", service, method).to_ascii_lowercase()
}

fn service_names(service: &ServiceDescriptor) -> Vec<String> {
    let mut names = vec![service.full_name().to_string(), service.name().to_string()];
    if let Some(short) = service.name().strip_suffix("Service") {
        if !short.is_empty() {
            names.push(short.to_string());
        }
    }
    names
}

fn index_service(methods: &mut HashMap<String, MethodDescriptor>, name: &str, service: &ServiceDescriptor) {
    for method in service.methods() {
        methods.insert(key(name, method.name()), method);
    }
}
