//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Registry::discover(service) → Vec<ServiceInstance>
//!     → Selector::select (strategy from static config):
//!         - random.rs (uniform, reseeded per call)
//!         - round_robin.rs (one process-wide counter)
//!         - least_conn.rs (fewest in-flight dispatches)
//!     → "ip:port"
//!     → Selector::track(address) guard held for the dispatch
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless over the instance list; the selector owns
//!   the shared counter and the in-flight table
//! - Empty input means "no target", never a panic
//! - One selector per gateway, shared across every service

pub mod least_conn;
pub mod random;
pub mod round_robin;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::registry::ServiceInstance;
use least_conn::LeastConnections;
use random::Random;
use round_robin::RoundRobin;

/// Strategy trait used by the selector.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick one instance, or None when the set is empty.
    fn next_instance<'a>(&self, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance>;
}

/// Configured selection strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Random,
    #[default]
    RoundRobin,
    LeastConn,
}

/// In-flight dispatch counts per backend address.
#[derive(Debug, Default)]
pub struct InFlight {
    counts: DashMap<String, Arc<AtomicUsize>>,
}

impl InFlight {
    /// Current number of in-flight dispatches to `address`.
    pub fn load(&self, address: &str) -> usize {
        self.counts
            .get(address)
            .map(|count| count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn acquire(&self, address: &str) -> InFlightGuard {
        let count = self
            .counts
            .entry(address.to_string())
            .or_default()
            .clone();
        count.fetch_add(1, Ordering::Relaxed);
        InFlightGuard { count }
    }
}

/// A RAII guard that holds one in-flight slot for an address.
#[derive(Debug)]
pub struct InFlightGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Chooses one backend instance per call.
#[derive(Debug)]
pub struct Selector {
    strategy: Box<dyn LoadBalancer>,
    in_flight: Arc<InFlight>,
}

impl Selector {
    pub fn new(strategy: Strategy) -> Self {
        let in_flight = Arc::new(InFlight::default());
        let strategy: Box<dyn LoadBalancer> = match strategy {
            Strategy::Random => Box::new(Random::new()),
            Strategy::RoundRobin => Box::new(RoundRobin::new()),
            Strategy::LeastConn => Box::new(LeastConnections::new(in_flight.clone())),
        };
        Self { strategy, in_flight }
    }

    /// Select an instance and return its `ip:port`, or None for an empty set.
    pub fn select(&self, instances: &[ServiceInstance]) -> Option<String> {
        self.strategy
            .next_instance(instances)
            .map(ServiceInstance::address)
    }

    /// Count a dispatch against `address` until the guard drops.
    pub fn track(&self, address: &str) -> InFlightGuard {
        self.in_flight.acquire(address)
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }
}

#[cfg(test)]
pub(crate) fn instances(addresses: &[(&str, u16)]) -> Vec<ServiceInstance> {
    addresses
        .iter()
        .enumerate()
        .map(|(i, (ip, port))| ServiceInstance::new(format!("i{}", i), "leaderboard", *ip, *port))
        .collect()
}
