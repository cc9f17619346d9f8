//! Outbound connection pooling subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway call for service S at address A
//!     → manager.rs (load-or-create the pool for S)
//!     → pool.rs get_conn(A):
//!         fast path: ready entry under read lock
//!         slow path: write lock, re-check, evict stale/LRU, dial via Connector
//!     → PooledConnection (RAII handle, returned to the pool on drop)
//!
//! Background:
//!     reaper task per pool → close entries idle longer than max_idle
//! ```
//!
//! # Design Decisions
//! - Pools are partitioned per service name, entries keyed by address
//! - The pool only knows the `Connector`/`RpcConnection` traits; the gRPC
//!   transport lives in `rpc`
//! - Reapers are owned workers stopped through a cancellation token

pub mod connection;
pub mod manager;
#[cfg(test)]
pub(crate) mod mock;
#[allow(clippy::module_inception)]
pub mod pool;

pub use connection::{ConnectivityState, Connector, RpcConnection, StateCell};
pub use manager::PoolManager;
pub use pool::{ConnectionPool, PooledConnection};
