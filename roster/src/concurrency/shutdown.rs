//! Broadcast shutdown signal.

use std::sync::Arc;
use tokio::sync::watch;

/// Receiver side of the shutdown signal.
///
/// The watched value turns `true` once shutdown is requested. A closed channel means the
/// sender is gone, which receivers treat the same way.
pub type ShutdownRx = watch::Receiver<bool>;

/// Sender side of the shutdown signal. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(Arc<watch::Sender<bool>>);

impl ShutdownTx {
    /// Signals every current and future subscriber to stop.
    pub fn shutdown(&self) {
        // `send_replace` succeeds even when no receiver is alive.
        self.0.send_replace(true);
    }

    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Creates a shutdown channel with one receiver.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(Arc::new(tx)), rx)
}

/// Returns `true` when shutdown was requested or the sender was dropped.
pub fn is_shutdown_requested(shutdown_rx: &ShutdownRx) -> bool {
    *shutdown_rx.borrow() || shutdown_rx.has_changed().is_err()
}

/// Resolves once shutdown is requested or the sender is dropped.
pub async fn wait_for_shutdown(shutdown_rx: &mut ShutdownRx) {
    let _ = shutdown_rx.wait_for(|requested| *requested).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_created_after_the_signal_observe_it() {
        let (tx, rx) = create_shutdown_channel();

        assert!(!is_shutdown_requested(&rx));

        tx.shutdown();
        let mut late = tx.subscribe();

        assert!(is_shutdown_requested(&rx));
        assert!(is_shutdown_requested(&late));
        wait_for_shutdown(&mut late).await;
    }

    #[tokio::test]
    async fn dropping_the_sender_counts_as_shutdown() {
        let (tx, mut rx) = create_shutdown_channel();
        drop(tx);

        assert!(is_shutdown_requested(&rx));
        wait_for_shutdown(&mut rx).await;
    }
}
