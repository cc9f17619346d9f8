//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: backend assumed down, calls fail fast
//! - Half-Open: one probe call decides whether the backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: after recovery timeout
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails
//! ```
//!
//! Circuits are tracked per key (the backend service name).

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use prost_reflect::DynamicMessage;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::error::{GatewayError, GatewayResult};

/// Wraps a backend call with a fail-fast policy.
#[async_trait]
pub trait CircuitBreaker: Send + Sync {
    async fn execute<'a>(
        &self,
        key: &str,
        call: BoxFuture<'a, GatewayResult<DynamicMessage>>,
    ) -> GatewayResult<DynamicMessage>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
enum Circuit {
    Closed { failures: u32 },
    Open { until: Instant },
    HalfOpen,
}

/// Opens after N consecutive failures, probes once after a cool-down.
#[derive(Debug)]
pub struct ConsecutiveFailureBreaker {
    threshold: u32,
    recovery: Duration,
    circuits: DashMap<String, Circuit>,
}

impl ConsecutiveFailureBreaker {
    pub fn new(threshold: u32, recovery: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            recovery,
            circuits: DashMap::new(),
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(config.failure_threshold, Duration::from_secs(config.recovery_timeout_secs))
    }

    pub fn state(&self, key: &str) -> CircuitState {
        match self.circuits.get(key).map(|c| *c) {
            None | Some(Circuit::Closed { .. }) => CircuitState::Closed,
            Some(Circuit::Open { .. }) => CircuitState::Open,
            Some(Circuit::HalfOpen) => CircuitState::HalfOpen,
        }
    }

    fn admit(&self, key: &str) -> bool {
        let mut circuit = self
            .circuits
            .entry(key.to_string())
            .or_insert(Circuit::Closed { failures: 0 });

        let current = *circuit;
        match current {
            Circuit::Closed { .. } => true,
            Circuit::Open { until } if Instant::now() >= until => {
                tracing::info!(key = %key, "Circuit half-open, admitting probe");
                *circuit = Circuit::HalfOpen;
                true
            }
            Circuit::Open { .. } | Circuit::HalfOpen => false,
        }
    }

    fn record(&self, key: &str, success: bool) {
        let Some(mut circuit) = self.circuits.get_mut(key) else {
            return;
        };

        let next = match (*circuit, success) {
            (Circuit::HalfOpen, true) => {
                tracing::info!(key = %key, "Circuit closed");
                Circuit::Closed { failures: 0 }
            }
            (_, true) => Circuit::Closed { failures: 0 },
            (Circuit::Closed { failures }, false) if failures + 1 < self.threshold => {
                Circuit::Closed { failures: failures + 1 }
            }
            (Circuit::Open { until }, false) => Circuit::Open { until },
            (_, false) => {
                tracing::warn!(key = %key, recovery = ?self.recovery, "Circuit opened");
                Circuit::Open {
                    until: Instant::now() + self.recovery,
                }
            }
        };
        *circuit = next;
    }

    /// An abandoned probe lets the next caller probe instead.
    fn release_probe(&self, key: &str) {
        if let Some(mut circuit) = self.circuits.get_mut(key) {
            if matches!(*circuit, Circuit::HalfOpen) {
                *circuit = Circuit::Open { until: Instant::now() };
            }
        }
    }
}

#[async_trait]
impl CircuitBreaker for ConsecutiveFailureBreaker {
    async fn execute<'a>(
        &self,
        key: &str,
        call: BoxFuture<'a, GatewayResult<DynamicMessage>>,
    ) -> GatewayResult<DynamicMessage> {
        if !self.admit(key) {
            return Err(GatewayError::CircuitOpen(key.to_string()));
        }

        let result = call.await;
        match &result {
            // The caller leaving says nothing about backend health.
            Err(GatewayError::Cancelled) => self.release_probe(key),
            other => self.record(key, other.is_ok()),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::leaderboard_pool;
    use futures_util::FutureExt;

    fn ok() -> BoxFuture<'static, GatewayResult<DynamicMessage>> {
        let descriptor = leaderboard_pool()
            .get_message_by_name("game.leaderboard.Entry")
            .unwrap();
        async move { Ok(DynamicMessage::new(descriptor)) }.boxed()
    }

    fn fail() -> BoxFuture<'static, GatewayResult<DynamicMessage>> {
        async { Err(GatewayError::Dispatch(tonic::Status::unavailable("down"))) }.boxed()
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold() {
        let breaker = ConsecutiveFailureBreaker::new(3, Duration::from_secs(30));

        for _ in 0..2 {
            assert!(breaker.execute("leaderboard", fail()).await.is_err());
        }
        assert_eq!(breaker.state("leaderboard"), CircuitState::Closed);

        assert!(breaker.execute("leaderboard", fail()).await.is_err());
        assert_eq!(breaker.state("leaderboard"), CircuitState::Open);

        let err = breaker.execute("leaderboard", ok()).await.unwrap_err();
        assert!(matches!(err, GatewayError::CircuitOpen(key) if key == "leaderboard"));
        assert_eq!(breaker.state("chat"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_count() {
        let breaker = ConsecutiveFailureBreaker::new(2, Duration::from_secs(30));
        let _ = breaker.execute("chat", fail()).await;
        assert!(breaker.execute("chat", ok()).await.is_ok());
        let _ = breaker.execute("chat", fail()).await;
        assert_eq!(breaker.state("chat"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe() {
        let breaker = ConsecutiveFailureBreaker::new(1, Duration::from_secs(30));
        let _ = breaker.execute("chat", fail()).await;
        assert_eq!(breaker.state("chat"), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(31)).await;
        let _ = breaker.execute("chat", fail()).await;
        assert_eq!(breaker.state("chat"), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(breaker.execute("chat", ok()).await.is_ok());
        assert_eq!(breaker.state("chat"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_not_counted() {
        let breaker = ConsecutiveFailureBreaker::new(1, Duration::from_secs(30));
        let cancelled: BoxFuture<'static, GatewayResult<DynamicMessage>> =
            async { Err(GatewayError::Cancelled) }.boxed();
        let _ = breaker.execute("chat", cancelled).await;
        assert_eq!(breaker.state("chat"), CircuitState::Closed);
    }
}
