//! In-memory connector used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use prost_reflect::DynamicMessage;

use crate::config::PoolConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::pool::connection::{ConnectivityState, Connector, RpcConnection, StateCell};
use crate::schema::ResolvedMethod;

/// Produces a backend reply for a request.
pub type Responder = Arc<dyn Fn(&ResolvedMethod, DynamicMessage) -> Result<DynamicMessage, tonic::Status> + Send + Sync>;

pub struct MockConnection {
    state: StateCell,
    closes: AtomicUsize,
    calls: AtomicUsize,
    responder: Option<Responder>,
}

impl MockConnection {
    pub fn set_state(&self, state: ConnectivityState) {
        self.state.set(state);
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcConnection for MockConnection {
    fn state(&self) -> ConnectivityState {
        self.state.get()
    }

    async fn invoke(&self, method: &ResolvedMethod, request: DynamicMessage) -> Result<DynamicMessage, tonic::Status> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.responder {
            Some(responder) => responder(method, request),
            None => Ok(method.new_response()),
        }
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.state.set(ConnectivityState::Shutdown);
    }
}

#[derive(Default)]
pub struct MockConnector {
    connections: Mutex<HashMap<String, Vec<Arc<MockConnection>>>>,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    responder: Option<Responder>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_responder(mut self, responder: Responder) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn fail(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn dials(&self, address: &str) -> usize {
        self.connections.lock().unwrap().get(address).map_or(0, Vec::len)
    }

    pub fn total_dials(&self) -> usize {
        self.connections.lock().unwrap().values().map(Vec::len).sum()
    }

    /// The `nth` connection dialed to `address`.
    pub fn connection(&self, address: &str, nth: usize) -> Arc<MockConnection> {
        self.connections.lock().unwrap()[address][nth].clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, address: &str, _config: &PoolConfig) -> GatewayResult<Arc<dyn RpcConnection>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(address) {
            return Err(GatewayError::Dial {
                address: address.to_string(),
                reason: "connection refused".into(),
            });
        }

        let conn = Arc::new(MockConnection {
            state: StateCell::new(ConnectivityState::Ready),
            closes: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            responder: self.responder.clone(),
        });
        self.connections
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .push(conn.clone());
        Ok(conn)
    }
}
