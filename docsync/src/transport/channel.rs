use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::SyncResult;
use crate::transport::{MessageTx, NotificationTransport};

/// Handle used to feed messages into a [`ChannelTransport`].
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::Sender<String>,
}

impl ChannelSender {
    /// Sends one raw message, waiting while the transport's buffer is full.
    ///
    /// Returns `false` once the transport has stopped.
    pub async fn send(&self, message: impl Into<String>) -> bool {
        self.tx.send(message.into()).await.is_ok()
    }
}

/// In-process transport fed through a [`ChannelSender`].
///
/// Used when docsync is embedded in an application that already receives change messages,
/// and in tests. The transport stops on shutdown or once every sender is dropped.
#[derive(Debug)]
pub struct ChannelTransport {
    rx: mpsc::Receiver<String>,
}

impl ChannelTransport {
    /// Creates a transport with a buffer of `capacity` messages and its sender.
    pub fn new(capacity: usize) -> (Self, ChannelSender) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        (Self { rx }, ChannelSender { tx })
    }
}

impl NotificationTransport for ChannelTransport {
    fn name() -> &'static str {
        "channel"
    }

    async fn run(mut self, tx: MessageTx, mut shutdown_rx: ShutdownRx) -> SyncResult<()> {
        info!("starting channel transport");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.wait() => {
                    info!("shutting down channel transport");
                    break;
                }

                message = self.rx.recv() => {
                    let Some(message) = message else {
                        info!("every channel sender was dropped, stopping channel transport");
                        break;
                    };

                    if tx.send(message).await.is_err() {
                        debug!("pipeline queue closed, stopping channel transport");
                        break;
                    }
                }
            }
        }

        // Closing the receiver makes later sends fail instead of silently queueing.
        self.rx.close();

        Ok(())
    }
}
