use std::future::Future;

use tokio::sync::mpsc;

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::SyncResult;

/// Sending side of the bounded queue between the transport and the router.
pub type MessageTx = mpsc::Sender<String>;

/// Source of raw change messages.
///
/// A transport pushes every message it receives into the pipeline queue, in delivery order,
/// until shutdown is requested or the queue is closed. Returning from [`run`] closes the queue,
/// which lets the rest of the pipeline drain what was already accepted.
///
/// Delivery is at least once at best: a transport may drop messages while disconnected and
/// may redeliver. The merge engine is idempotent so duplicates are harmless.
///
/// [`run`]: NotificationTransport::run
pub trait NotificationTransport {
    /// Returns the name of the transport.
    fn name() -> &'static str;

    /// Delivers messages into `tx` until shutdown is requested or `tx` is closed.
    fn run(
        self,
        tx: MessageTx,
        shutdown_rx: ShutdownRx,
    ) -> impl Future<Output = SyncResult<()>> + Send;
}
