//! Startup orchestration.
//!
//! # Order
//! 1. Metrics exporter (logging is installed by the binary before config errors can occur)
//! 2. Schema registry from the descriptor set
//! 3. Registry client, then self-registration
//! 4. Gateway context
//! 5. Listeners (traffic only once everything else is ready)
//!
//! Any startup error is fatal. Shutdown runs in reverse: stop accepting,
//! close sessions and pools, deregister.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::{GatewayConfig, RegistryConfig};
use crate::gateway::Gateway;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::registry::{MemoryRegistry, Registry, ServiceInstance};
use crate::rpc::GrpcConnector;
use crate::schema::SchemaRegistry;
use crate::websocket::WebSocketServer;

pub type StartupError = Box<dyn std::error::Error + Send + Sync>;

/// Run the gateway until a shutdown signal arrives.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let schemas = load_schemas(&config)?;
    let registry = build_registry(&config.registry)?;

    let own_instance = self_instance(&config.registry);
    if let Some(instance) = &own_instance {
        registry.register(instance.clone()).await?;
    }

    let gateway = Arc::new(Gateway::new(
        config.clone(),
        registry.clone(),
        Arc::new(schemas),
        Arc::new(GrpcConnector::new()),
    ));

    let http_listener = TcpListener::bind(&config.http.bind_address).await?;
    let ws_listener = TcpListener::bind(&config.websocket.bind_address).await?;

    let listeners = Shutdown::new();
    let mut http = tokio::spawn(HttpServer::new(gateway.clone()).run(http_listener, listeners.subscribe()));
    let mut ws = tokio::spawn(WebSocketServer::new(gateway.clone()).run(ws_listener, listeners.subscribe()));

    tracing::info!(
        http = %config.http.bind_address,
        websocket = %config.websocket.bind_address,
        "Gateway ready"
    );

    tokio::select! {
        _ = signals::wait_for_signal() => {}
        result = &mut http => tracing::error!(result = ?result, "HTTP server exited"),
        result = &mut ws => tracing::error!(result = ?result, "WebSocket server exited"),
    }

    tracing::info!("Shutting down");
    listeners.trigger();
    gateway.shutdown().await;

    if !http.is_finished() {
        let _ = http.await;
    }
    if !ws.is_finished() {
        let _ = ws.await;
    }

    if let Some(instance) = &own_instance {
        if let Err(e) = registry.deregister(instance).await {
            tracing::warn!(error = %e, "Deregistration failed");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn load_schemas(config: &GatewayConfig) -> Result<SchemaRegistry, StartupError> {
    match &config.schema.descriptor_set {
        Some(path) => {
            let registry = SchemaRegistry::from_descriptor_file(Path::new(path), &config.schema.aliases)?;
            tracing::info!(path = %path, methods = registry.len(), "Schemas loaded");
            Ok(registry)
        }
        None => {
            tracing::warn!("No descriptor set configured; every method will be unknown");
            Ok(SchemaRegistry::empty())
        }
    }
}

fn build_registry(config: &RegistryConfig) -> Result<Arc<dyn Registry>, StartupError> {
    match config.kind.as_str() {
        "static" => Ok(Arc::new(MemoryRegistry::with_instances(config.instances.clone()))),
        other => Err(format!("unsupported registry kind: {}", other).into()),
    }
}

/// This gateway's own instance, when a service name is configured.
fn self_instance(config: &RegistryConfig) -> Option<ServiceInstance> {
    if config.service_name.is_empty() {
        return None;
    }

    let id = if config.pod_name.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        config.pod_name.clone()
    };
    Some(ServiceInstance::new(id, &config.service_name, &config.pod_ip, config.grpc_port))
}
