//! Shutdown coordination for the gateway.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Every long-running task (pool reapers, WebSocket sessions, listeners)
/// holds a child token; triggering cancels them all.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled when shutdown is triggered. Cancelling the child
    /// does not affect the coordinator.
    pub fn subscribe(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown is triggered.
    pub async fn triggered(&self) {
        self.token.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_subscribers() {
        let shutdown = Shutdown::new();
        let child = shutdown.subscribe();
        assert!(!shutdown.is_triggered());

        shutdown.trigger();
        child.cancelled().await;
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_child_cancel_is_local() {
        let shutdown = Shutdown::new();
        let child = shutdown.subscribe();
        child.cancel();
        assert!(!shutdown.is_triggered());
    }
}
