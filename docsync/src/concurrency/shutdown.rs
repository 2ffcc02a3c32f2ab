use std::sync::Arc;

use tokio::sync::watch;

/// Receiving side of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownRx {
    rx: watch::Receiver<bool>,
}

impl ShutdownRx {
    /// Returns `true` once shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once shutdown has been requested, immediately if it already was.
    ///
    /// Also completes when every sender is gone, since nobody can request shutdown anymore
    /// and waiting forever would leak the caller.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|shutdown| *shutdown).await;
    }
}

/// Sending side of the shutdown signal. Clones share the same signal.
#[derive(Debug, Clone)]
pub struct ShutdownTx {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTx {
    /// Requests shutdown.
    ///
    /// Returns `true` if this call requested it and `false` if shutdown was already requested,
    /// which makes repeated calls harmless.
    pub fn shutdown(&self) -> bool {
        self.tx.send_if_modified(|shutdown| {
            if *shutdown {
                return false;
            }

            *shutdown = true;
            true
        })
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Creates a new receiver, which observes a shutdown requested before it subscribed.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx {
            rx: self.tx.subscribe(),
        }
    }
}

/// Result of an operation that may be interrupted by shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult<T, I> {
    /// The operation completed.
    Ok(T),
    /// Shutdown was requested before the operation completed.
    Shutdown(I),
}

impl<T, I> ShutdownResult<T, I> {
    pub fn should_shutdown(&self) -> bool {
        matches!(self, ShutdownResult::Shutdown(_))
    }
}

/// Creates a new shutdown channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);

    (ShutdownTx { tx: Arc::new(tx) }, ShutdownRx { rx })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn shutdown_is_idempotent_and_seen_by_late_subscribers() {
        let (tx, mut rx) = create_shutdown_channel();

        assert!(!rx.is_shutdown());
        assert!(tx.shutdown());
        assert!(!tx.shutdown());

        rx.wait().await;
        let late = tx.subscribe();
        assert!(late.is_shutdown());
    }

    #[tokio::test]
    async fn wait_blocks_until_shutdown() {
        let (tx, mut rx) = create_shutdown_channel();

        let waiter = tokio::spawn(async move { rx.wait().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tx.shutdown();
        waiter.await.unwrap();
    }
}
