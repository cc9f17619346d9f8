//! Outbound connection abstraction.
//!
//! # Responsibilities
//! - Report transport connectivity state to the pool
//! - Carry one unary call for a resolved method
//! - Dial new connections with the pool's transport options

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use prost_reflect::DynamicMessage;

use crate::config::PoolConfig;
use crate::error::GatewayResult;
use crate::schema::ResolvedMethod;

/// Transport connectivity state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Idle = 0,
    Connecting = 1,
    Ready = 2,
    TransientFailure = 3,
    Shutdown = 4,
}

impl From<u8> for ConnectivityState {
    fn from(val: u8) -> Self {
        match val {
            1 => ConnectivityState::Connecting,
            2 => ConnectivityState::Ready,
            3 => ConnectivityState::TransientFailure,
            4 => ConnectivityState::Shutdown,
            _ => ConnectivityState::Idle,
        }
    }
}

/// Atomically updated connectivity state.
///
/// `Shutdown` is terminal: later transitions are ignored.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: ConnectivityState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> ConnectivityState {
        ConnectivityState::from(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ConnectivityState) {
        let _ = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            (current != ConnectivityState::Shutdown as u8).then_some(state as u8)
        });
    }
}

/// A live connection to one backend address.
#[async_trait]
pub trait RpcConnection: Send + Sync + 'static {
    /// Current transport state.
    fn state(&self) -> ConnectivityState;

    /// Invoke `method` with `request` and return the typed response.
    async fn invoke(&self, method: &ResolvedMethod, request: DynamicMessage) -> Result<DynamicMessage, tonic::Status>;

    /// Close the transport. Idempotent.
    fn close(&self);
}

/// Dials backend addresses.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, address: &str, config: &PoolConfig) -> GatewayResult<Arc<dyn RpcConnection>>;
}
