//! Shutdown signalling via `CancellationToken`.
//!
//! Cancelling the root token stops the HTTP listener and, through child
//! tokens, every live WebSocket connection.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Root of the gateway's cancellation tree.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the root token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Token for one connection, cancelled with the root but also
    /// cancellable on its own.
    pub fn connection_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Fire the shutdown. Repeated calls are no-ops.
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("gateway shutdown requested");
            self.token.cancel();
        }
    }

    /// Whether shutdown has fired.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_not_shutting_down() {
        assert!(!ShutdownCoordinator::new().is_shutting_down());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let coord = ShutdownCoordinator::new();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
    }

    #[test]
    fn connection_tokens_follow_root() {
        let coord = ShutdownCoordinator::new();
        let a = coord.connection_token();
        let b = coord.connection_token();
        a.cancel();
        assert!(!coord.is_shutting_down());
        assert!(!b.is_cancelled());
        coord.shutdown();
        assert!(b.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let handle = tokio::spawn(async move {
            token.cancelled().await;
            true
        });
        coord.shutdown();
        assert!(handle.await.unwrap());
    }
}
