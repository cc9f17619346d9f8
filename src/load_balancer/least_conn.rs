//! Least Connections load balancing strategy.

use std::sync::Arc;
use crate::load_balancer::{InFlight, LoadBalancer};
use crate::registry::ServiceInstance;

/// Least connections selector.
/// Selects the instance with the fewest in-flight dispatches.
#[derive(Debug)]
pub struct LeastConnections {
    in_flight: Arc<InFlight>,
}

impl LeastConnections {
    pub fn new(in_flight: Arc<InFlight>) -> Self {
        Self { in_flight }
    }
}

impl LoadBalancer for LeastConnections {
    fn next_instance<'a>(&self, instances: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        // In case of tie, the first one is selected (stability)
        instances
            .iter()
            .min_by_key(|instance| self.in_flight.load(&instance.address()))
    }
}

#[cfg(test)]
mod tests {
    use crate::load_balancer::{instances, Selector, Strategy};

    #[test]
    fn test_least_conn() {
        let selector = Selector::new(Strategy::LeastConn);
        let set = instances(&[("127.0.0.1", 8080), ("127.0.0.1", 8081)]);

        // tie: first wins
        assert_eq!(selector.select(&set).unwrap(), "127.0.0.1:8080");

        let _busy = selector.track("127.0.0.1:8080");
        assert_eq!(selector.select(&set).unwrap(), "127.0.0.1:8081");

        let _b1 = selector.track("127.0.0.1:8081");
        let _b2 = selector.track("127.0.0.1:8081");
        // now 8081 has 2, 8080 has 1
        assert_eq!(selector.select(&set).unwrap(), "127.0.0.1:8080");
    }
}
