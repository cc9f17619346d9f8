//! Process-wide set of live WebSocket sessions.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Register sessions for broadcast and shutdown fan-out
//! - Remove sessions on every exit path (RAII registration)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Only uniqueness matters, so relaxed ordering is enough.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

/// Commands delivered to a session's writer from outside the session.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A pre-encoded binary frame.
    Frame(Bytes),
    /// Send a normal-closure frame and end the session.
    Close,
}

/// Concurrent registry of sessions; callers need no external locking.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<DashMap<ConnectionId, mpsc::Sender<Outbound>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. It stays registered until the returned guard drops.
    pub fn register(&self, id: ConnectionId, outbound: mpsc::Sender<Outbound>) -> Registration {
        self.clients.insert(id, outbound);
        Registration {
            id,
            clients: self.clients.clone(),
        }
    }

    /// Offer `frame` to every session without waiting. Returns how many
    /// sessions accepted it; full or closed sessions are skipped.
    pub fn broadcast(&self, frame: Bytes) -> usize {
        self.send_all(Outbound::Frame(frame))
    }

    /// Ask every session to close normally. Returns how many were asked.
    pub fn close_all(&self) -> usize {
        self.send_all(Outbound::Close)
    }

    fn send_all(&self, command: Outbound) -> usize {
        let mut delivered = 0;
        for client in self.clients.iter() {
            match client.value().try_send(command.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(connection_id = %client.key(), error = %e, "Skipping session");
                }
            }
        }
        delivered
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Removes its session from the registry on drop.
#[derive(Debug)]
pub struct Registration {
    id: ConnectionId,
    clients: Arc<DashMap<ConnectionId, mpsc::Sender<Outbound>>>,
}

impl Registration {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.clients.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
        assert!(a.to_string().starts_with("ws-"));
    }

    #[test]
    fn test_registration_guard() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let id = ConnectionId::new();

        let registration = registry.register(id, tx);
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);

        drop(registration);
        assert!(!registry.contains(id));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_best_effort() {
        let registry = ClientRegistry::new();
        let (fast_tx, mut fast_rx) = mpsc::channel(4);
        let (full_tx, _full_rx) = mpsc::channel(1);
        let _a = registry.register(ConnectionId::new(), fast_tx);
        let _b = registry.register(ConnectionId::new(), full_tx.clone());
        full_tx.try_send(Outbound::Close).unwrap();

        let delivered = registry.broadcast(Bytes::from_static(b"\x00\x00\x00\x00"));
        assert_eq!(delivered, 1);
        assert!(matches!(fast_rx.recv().await, Some(Outbound::Frame(frame)) if frame.len() == 4));
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = ClientRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        let _registration = registry.register(ConnectionId::new(), tx);

        assert_eq!(registry.close_all(), 1);
        assert!(matches!(rx.recv().await, Some(Outbound::Close)));
    }
}
