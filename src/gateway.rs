//! Gateway context.
//!
//! Owns every structure shared across requests and sessions: the registry
//! client, schema registry, instance selector, pool-of-pools, dispatcher,
//! optional circuit breaker, WebSocket client set and shutdown coordinator.
//! Constructed once at startup and passed to the servers behind an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use prost::Message;
use prost_reflect::DynamicMessage;
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{InFlightGuard, Selector};
use crate::pool::{Connector, PoolManager, PooledConnection, RpcConnection};
use crate::registry::Registry;
use crate::resilience::{CircuitBreaker, ConsecutiveFailureBreaker};
use crate::rpc::Dispatcher;
use crate::schema::{ResolvedMethod, SchemaRegistry};
use crate::websocket::clients::ClientRegistry;
use crate::websocket::frame::{self, WsMessage};

/// A pooled connection checked out for one call, counted as in flight
/// against its address until dropped.
pub struct Lease {
    conn: PooledConnection,
    _in_flight: InFlightGuard,
}

impl Lease {
    pub fn address(&self) -> &str {
        self.conn.address()
    }

    pub fn connection(&self) -> &dyn RpcConnection {
        &*self.conn
    }
}

pub struct Gateway {
    config: GatewayConfig,
    registry: Arc<dyn Registry>,
    schemas: Arc<SchemaRegistry>,
    selector: Selector,
    pools: PoolManager,
    dispatcher: Dispatcher,
    breaker: Option<Arc<dyn CircuitBreaker>>,
    clients: ClientRegistry,
    shutdown: Shutdown,
}

impl Gateway {
    /// Must be called within a Tokio runtime (pools spawn reapers lazily).
    pub fn new(
        config: GatewayConfig,
        registry: Arc<dyn Registry>,
        schemas: Arc<SchemaRegistry>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let shutdown = Shutdown::new();
        let pools = PoolManager::new(config.pool.clone(), connector, shutdown.subscribe());
        let breaker = config.circuit_breaker.enabled.then(|| {
            Arc::new(ConsecutiveFailureBreaker::from_config(&config.circuit_breaker)) as Arc<dyn CircuitBreaker>
        });

        Self {
            selector: Selector::new(config.balancer.strategy),
            dispatcher: Dispatcher::new(config.rpc.timeout()),
            registry,
            schemas,
            pools,
            breaker,
            clients: ClientRegistry::new(),
            shutdown,
            config,
        }
    }

    /// Replace the configured breaker with a caller-supplied one.
    pub fn with_circuit_breaker(mut self, breaker: Arc<dyn CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Discover `service`, pick an instance and check out a connection from
    /// the service's pool.
    pub async fn acquire(&self, service: &str) -> GatewayResult<Lease> {
        let instances = self
            .registry
            .discover(service)
            .await
            .map_err(|source| GatewayError::Discovery {
                service: service.to_string(),
                source,
            })?;

        let address = self
            .selector
            .select(&instances)
            .ok_or_else(|| GatewayError::NoInstances(service.to_string()))?;

        let conn = self.pools.pool_for(service).get_conn(&address).await?;
        tracing::debug!(service = %service, address = %address, "Connection acquired");

        Ok(Lease {
            _in_flight: self.selector.track(&address),
            conn,
        })
    }

    pub fn resolve(&self, service: &str, method: &str) -> GatewayResult<ResolvedMethod> {
        self.schemas.resolve(service, method)
    }

    pub async fn dispatch(
        &self,
        cancel: &CancellationToken,
        lease: &Lease,
        method: &ResolvedMethod,
        request: DynamicMessage,
    ) -> GatewayResult<DynamicMessage> {
        self.dispatcher.dispatch(cancel, lease.connection(), method, request).await
    }

    /// Run one envelope end to end and build the reply envelope.
    pub async fn call_envelope(&self, cancel: &CancellationToken, envelope: &WsMessage) -> GatewayResult<WsMessage> {
        let method = self.resolve(&envelope.service, &envelope.method)?;
        let request = DynamicMessage::decode(method.input(), envelope.payload.clone())?;
        let lease = self.acquire(&envelope.service).await?;

        let call = self.dispatch(cancel, &lease, &method, request);
        let response = match &self.breaker {
            Some(breaker) => breaker.execute(&envelope.service, Box::pin(call)).await?,
            None => call.await?,
        };

        Ok(WsMessage::new(
            envelope.service.clone(),
            envelope.method.clone(),
            response.encode_to_vec(),
        ))
    }

    /// Push one frame to every connected session. Best effort; returns how
    /// many sessions accepted it.
    pub fn broadcast(&self, service: &str, method: &str, payload: impl Into<bytes::Bytes>) -> GatewayResult<usize> {
        let frame = frame::encode(&WsMessage::new(service, method, payload))?;
        let delivered = self.clients.broadcast(frame);
        tracing::debug!(service = %service, method = %method, delivered, "Broadcast sent");
        Ok(delivered)
    }

    /// Close sessions normally, stop background workers, close pooled
    /// connections.
    pub async fn shutdown(&self) {
        let asked = self.clients.close_all();
        if asked > 0 {
            tracing::info!(sessions = asked, "Closing WebSocket sessions");
            let drained = tokio::time::timeout(self.config.websocket.close_deadline(), async {
                while !self.clients.is_empty() {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
            .await;
            if drained.is_err() {
                tracing::warn!(remaining = self.clients.len(), "Sessions still open after close deadline");
            }
        }

        self.shutdown.trigger();
        self.pools.shutdown().await;
        tracing::info!("Gateway stopped");
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn pools(&self) -> &PoolManager {
        &self.pools
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Token cancelled when the gateway shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_triggered()
    }
}
