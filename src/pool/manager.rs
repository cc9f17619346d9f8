//! Pool-of-pools, one pool per backend service name.

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::config::PoolConfig;
use crate::pool::connection::Connector;
use crate::pool::pool::ConnectionPool;

/// Lazily creates and caches one `ConnectionPool` per service.
#[derive(Clone)]
pub struct PoolManager {
    pools: Arc<DashMap<String, ConnectionPool>>,
    connector: Arc<dyn Connector>,
    config: PoolConfig,
    shutdown: CancellationToken,
}

impl PoolManager {
    pub fn new(config: PoolConfig, connector: Arc<dyn Connector>, shutdown: CancellationToken) -> Self {
        Self {
            pools: Arc::new(DashMap::new()),
            connector,
            config,
            shutdown,
        }
    }

    /// Load-or-create the pool for `service`. Concurrent first callers
    /// observe the same pool.
    pub fn pool_for(&self, service: &str) -> ConnectionPool {
        if let Some(pool) = self.pools.get(service) {
            return pool.clone();
        }

        self.pools
            .entry(service.to_string())
            .or_insert_with(|| {
                tracing::debug!(service = %service, "Creating connection pool");
                ConnectionPool::new(
                    service,
                    self.config.clone(),
                    self.connector.clone(),
                    self.shutdown.child_token(),
                )
            })
            .clone()
    }

    /// Number of per-service pools created so far.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Stop every reaper and close every pooled connection.
    pub async fn shutdown(&self) {
        let pools: Vec<ConnectionPool> = self.pools.iter().map(|p| p.value().clone()).collect();
        for pool in pools {
            pool.shutdown().await;
        }
    }
}
