//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use crate::load_balancer::LoadBalancer;
use crate::registry::ServiceInstance;

/// Round-robin selector.
/// One counter is shared by every service routed through the gateway, so
/// sequences of distinct services interleave while each stays fair.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_instance<'a>(&self, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }

        let index = self.counter.fetch_add(1, Ordering::Relaxed) % instances.len();
        instances.get(index)
    }
}
