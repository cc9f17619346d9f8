//! Per-service connection pool.
//!
//! # Responsibilities
//! - Hold at most one live connection per backend address
//! - Hand out ready connections, replacing stale ones
//! - Bound the pool size, evicting the least recently used entry
//! - Reap idle connections in the background
//!
//! # Design Decisions
//! - Read lock for the hot path; write lock serializes dial and evict, so
//!   concurrent misses on one address produce a single dial
//! - Dialing happens under the write lock (dials are rare next to hits)
//! - Handles return to the pool on drop instead of closing the transport

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::PoolConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;
use crate::pool::connection::{ConnectivityState, Connector, RpcConnection};

/// A cached connection and its recency stamp.
struct PoolEntry {
    address: String,
    conn: Arc<dyn RpcConnection>,
    /// Milliseconds since the pool epoch.
    last_used: AtomicU64,
}

impl PoolEntry {
    fn new(address: &str, conn: Arc<dyn RpcConnection>, epoch: Instant) -> Self {
        let entry = Self {
            address: address.to_string(),
            conn,
            last_used: AtomicU64::new(0),
        };
        entry.touch(epoch);
        entry
    }

    fn touch(&self, epoch: Instant) {
        let offset = epoch.elapsed().as_millis() as u64;
        self.last_used.store(offset, Ordering::Relaxed);
    }

    fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }

    fn is_ready(&self) -> bool {
        self.conn.state() == ConnectivityState::Ready
    }
}

struct PoolInner {
    service: String,
    config: PoolConfig,
    connector: Arc<dyn Connector>,
    entries: RwLock<HashMap<String, Arc<PoolEntry>>>,
    epoch: Instant,
    shutdown: CancellationToken,
}

/// Bounded, idle-reaping cache of connections keyed by address.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create a pool and start its reaper. Must be called within a Tokio runtime.
    pub fn new(
        service: impl Into<String>,
        config: PoolConfig,
        connector: Arc<dyn Connector>,
        shutdown: CancellationToken,
    ) -> Self {
        let inner = Arc::new(PoolInner {
            service: service.into(),
            config,
            connector,
            entries: RwLock::new(HashMap::new()),
            epoch: Instant::now(),
            shutdown,
        });
        spawn_reaper(&inner);
        Self { inner }
    }

    pub fn service(&self) -> &str {
        &self.inner.service
    }

    /// Return a ready connection for `address`, dialing if needed.
    pub async fn get_conn(&self, address: &str) -> GatewayResult<PooledConnection> {
        {
            let entries = self.inner.entries.read().await;
            if let Some(entry) = entries.get(address) {
                if entry.is_ready() {
                    entry.touch(self.inner.epoch);
                    return Ok(self.handle(entry.clone()));
                }
            }
        }

        let mut entries = self.inner.entries.write().await;

        // Another caller may have dialed while we waited for the lock.
        if let Some(entry) = entries.get(address) {
            if entry.is_ready() {
                entry.touch(self.inner.epoch);
                return Ok(self.handle(entry.clone()));
            }
        }

        if let Some(stale) = entries.remove(address) {
            tracing::debug!(
                service = %self.inner.service,
                address = %address,
                state = ?stale.conn.state(),
                "Replacing stale connection"
            );
            stale.conn.close();
            metrics::record_pool_eviction(&self.inner.service, "stale");
        }

        if entries.len() >= self.inner.config.max_conns {
            self.evict_oldest(&mut entries);
        }

        let conn = self.dial(address).await?;
        let entry = Arc::new(PoolEntry::new(address, conn, self.inner.epoch));
        entries.insert(address.to_string(), entry.clone());

        tracing::debug!(
            service = %self.inner.service,
            address = %address,
            pooled = entries.len(),
            "Connection established"
        );
        Ok(self.handle(entry))
    }

    /// Close and remove every entry idle for longer than `max_idle`.
    /// Returns the number of connections reaped.
    pub async fn reap_idle(&self) -> usize {
        let max_idle = self.inner.config.max_idle().as_millis() as u64;
        let now = self.inner.epoch.elapsed().as_millis() as u64;

        let mut entries = self.inner.entries.write().await;
        let before = entries.len();
        entries.retain(|address, entry| {
            let idle = now.saturating_sub(entry.last_used());
            if idle > max_idle {
                tracing::debug!(
                    service = %self.inner.service,
                    address = %address,
                    idle_ms = idle,
                    "Reaping idle connection"
                );
                entry.conn.close();
                false
            } else {
                true
            }
        });

        let reaped = before - entries.len();
        for _ in 0..reaped {
            metrics::record_pool_eviction(&self.inner.service, "idle");
        }
        reaped
    }

    /// Stop the reaper and close every pooled connection.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let mut entries = self.inner.entries.write().await;
        for (_, entry) in entries.drain() {
            entry.conn.close();
        }
    }

    /// Number of pooled connections.
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, address: &str) -> bool {
        self.inner.entries.read().await.contains_key(address)
    }

    fn handle(&self, entry: Arc<PoolEntry>) -> PooledConnection {
        PooledConnection {
            entry,
            pool: Arc::downgrade(&self.inner),
        }
    }

    async fn dial(&self, address: &str) -> GatewayResult<Arc<dyn RpcConnection>> {
        let connect = self.inner.connector.connect(address, &self.inner.config);
        let result = match time::timeout(self.inner.config.connect_timeout(), connect).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Dial {
                address: address.to_string(),
                reason: format!("connect timed out after {:?}", self.inner.config.connect_timeout()),
            }),
        };

        metrics::record_pool_dial(&self.inner.service, result.is_ok());
        if let Err(e) = &result {
            tracing::warn!(service = %self.inner.service, address = %address, error = %e, "Dial failed");
        }
        result
    }

    /// Evict the entry with the oldest `last_used`. Ties resolve to the
    /// lowest address so the choice is deterministic.
    fn evict_oldest(&self, entries: &mut HashMap<String, Arc<PoolEntry>>) {
        let victim = entries
            .values()
            .min_by(|a, b| {
                a.last_used()
                    .cmp(&b.last_used())
                    .then_with(|| a.address.cmp(&b.address))
            })
            .map(|entry| entry.address.clone());

        if let Some(address) = victim {
            if let Some(entry) = entries.remove(&address) {
                tracing::debug!(service = %self.inner.service, address = %address, "Evicting least recently used connection");
                entry.conn.close();
                metrics::record_pool_eviction(&self.inner.service, "capacity");
            }
        }
    }
}

fn spawn_reaper(inner: &Arc<PoolInner>) {
    let pool = Arc::downgrade(inner);
    let shutdown = inner.shutdown.clone();
    let period = inner.config.reap_interval().max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(inner) = pool.upgrade() else { break };
                    ConnectionPool { inner }.reap_idle().await;
                }
                _ = shutdown.cancelled() => break,
            }
        }
    });
}

/// A connection borrowed from the pool.
///
/// Dropping the handle returns the connection: its recency is refreshed and
/// it is re-registered if the pool no longer holds it. A connection that has
/// reached `Shutdown` is dropped instead.
pub struct PooledConnection {
    entry: Arc<PoolEntry>,
    pool: Weak<PoolInner>,
}

impl PooledConnection {
    pub fn address(&self) -> &str {
        &self.entry.address
    }
}

impl Deref for PooledConnection {
    type Target = dyn RpcConnection;
    fn deref(&self) -> &Self::Target {
        &*self.entry.conn
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(pool) = self.pool.upgrade() else { return };
        let address = &self.entry.address;

        if self.entry.conn.state() == ConnectivityState::Shutdown {
            if let Ok(mut entries) = pool.entries.try_write() {
                if entries.get(address).is_some_and(|e| Arc::ptr_eq(e, &self.entry)) {
                    entries.remove(address);
                }
            }
            return;
        }

        self.entry.touch(pool.epoch);
        if let Ok(mut entries) = pool.entries.try_write() {
            if !entries.contains_key(address) && entries.len() < pool.config.max_conns {
                entries.insert(address.clone(), self.entry.clone());
            }
        };
    }
}
