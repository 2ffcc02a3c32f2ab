use std::io::BufReader;
use std::time::Duration;

use docsync_config::shared::SourceConfig;
use futures::{Stream, StreamExt, future, stream};
use metrics::counter;
use rand::Rng;
use rustls::ClientConfig;
use tokio_postgres::tls::MakeTlsConnect;
use tokio_postgres::{AsyncMessage, Client, Connection, NoTls, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, error, info, warn};

use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::metrics::DOCSYNC_TRANSPORT_RECONNECTS_TOTAL;
use crate::sync_error;
use crate::transport::{MessageTx, NotificationTransport};

/// Maximum random extension of a reconnection delay, as a fraction of the delay.
const MAX_JITTER_FACTOR: f64 = 0.3;

/// How a listening session ended.
enum SessionEnd {
    /// The pipeline queue was closed, nobody consumes messages anymore.
    QueueClosed,
    /// The connection was lost and should be re-established.
    Disconnected(SyncError),
}

/// Transport listening to Postgres `NOTIFY` messages on one channel.
///
/// Every notification payload is forwarded as one raw message. When the connection drops the
/// transport reconnects, doubling the delay from the configured minimum up to the maximum and
/// extending it with random jitter. Notifications sent while disconnected are lost.
#[derive(Debug)]
pub struct PgNotifyTransport {
    config: SourceConfig,
}

impl PgNotifyTransport {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn min_delay(&self) -> Duration {
        Duration::from_millis(self.config.min_reconnect_interval_ms)
    }

    fn max_delay(&self) -> Duration {
        Duration::from_millis(self.config.max_reconnect_interval_ms)
    }

    /// Connects, listens and forwards notifications until the session ends.
    async fn listen(&self, tx: &MessageTx) -> SyncResult<SessionEnd> {
        let config = self.config.connection.to_listener_config();

        if self.config.connection.tls.enabled {
            let tls = build_tls_config(&self.config.connection.tls.trusted_root_certs)?;
            let (client, connection) = config.connect(MakeRustlsConnect::new(tls)).await?;
            self.forward::<MakeRustlsConnect>(client, connection, tx).await
        } else {
            let (client, connection) = config.connect(NoTls).await?;
            self.forward::<NoTls>(client, connection, tx).await
        }
    }

    async fn forward<T>(
        &self,
        client: Client,
        mut connection: Connection<Socket, T::Stream>,
        tx: &MessageTx,
    ) -> SyncResult<SessionEnd>
    where
        T: MakeTlsConnect<Socket>,
        T::Stream: Send + 'static,
    {
        let messages = stream::poll_fn(move |cx| connection.poll_message(cx));
        let mut notifications = Box::pin(notifications(messages));

        // The connection only makes progress while it is polled, so the `LISTEN` query runs
        // concurrently with the notification stream.
        let statement = format!("LISTEN {}", quote_identifier(&self.config.channel));
        let listen = client.batch_execute(&statement);
        tokio::pin!(listen);

        let mut listening = false;
        loop {
            tokio::select! {
                result = &mut listen, if !listening => {
                    result?;
                    listening = true;
                    info!(channel = %self.config.channel, "listening for notifications");
                }

                notification = notifications.next() => {
                    match notification {
                        Some(Ok(payload)) => {
                            debug!(channel = %self.config.channel, "notification received");
                            if tx.send(payload).await.is_err() {
                                return Ok(SessionEnd::QueueClosed);
                            }
                        }
                        Some(Err(err)) => return Ok(SessionEnd::Disconnected(err)),
                        None => {
                            return Ok(SessionEnd::Disconnected(sync_error!(
                                ErrorKind::TransportFailed,
                                "notification connection closed"
                            )));
                        }
                    }
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .min_delay()
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.max_delay());
        let jitter = rand::rng().random::<f64>() * MAX_JITTER_FACTOR;

        base.mul_f64(1.0 + jitter)
    }
}

impl NotificationTransport for PgNotifyTransport {
    fn name() -> &'static str {
        "postgres_notify"
    }

    async fn run(self, tx: MessageTx, mut shutdown_rx: ShutdownRx) -> SyncResult<()> {
        info!(channel = %self.config.channel, "starting postgres notify transport");

        let mut attempt = 0;
        loop {
            let session = tokio::select! {
                biased;

                _ = shutdown_rx.wait() => ShutdownResult::Shutdown(()),
                result = self.listen(&tx) => ShutdownResult::Ok(result),
            };

            let err = match session {
                ShutdownResult::Shutdown(()) => {
                    info!("shutting down postgres notify transport");
                    return Ok(());
                }
                ShutdownResult::Ok(Ok(SessionEnd::QueueClosed)) => {
                    info!("pipeline queue closed, stopping postgres notify transport");
                    return Ok(());
                }
                ShutdownResult::Ok(Ok(SessionEnd::Disconnected(err))) => {
                    // A session that got far enough to disconnect was healthy before.
                    attempt = 0;
                    err
                }
                ShutdownResult::Ok(Err(err)) => err,
            };

            attempt += 1;
            let delay = self.backoff(attempt);
            counter!(DOCSYNC_TRANSPORT_RECONNECTS_TOTAL).increment(1);
            warn!(
                error = %err,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "notification connection lost, reconnecting"
            );

            tokio::select! {
                biased;

                _ = shutdown_rx.wait() => {
                    info!("shutting down postgres notify transport while reconnecting");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Keeps the notification payloads of a connection message stream, surfacing its errors.
fn notifications<S>(messages: S) -> impl Stream<Item = SyncResult<String>>
where
    S: Stream<Item = Result<AsyncMessage, tokio_postgres::Error>>,
{
    messages.filter_map(|message| {
        future::ready(match message {
            Ok(AsyncMessage::Notification(notification)) => {
                Some(Ok(notification.payload().to_string()))
            }
            Ok(AsyncMessage::Notice(notice)) => {
                debug!(notice = %notice, "postgres notice received");
                None
            }
            Ok(_) => None,
            Err(err) => {
                error!(error = %err, "notification connection failed");
                Some(Err(SyncError::from(err)))
            }
        })
    })
}

fn build_tls_config(trusted_root_certs: &str) -> SyncResult<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    let mut root_certs_reader = BufReader::new(trusted_root_certs.as_bytes());
    for cert in rustls_pemfile::certs(&mut root_certs_reader) {
        let cert = cert.map_err(|err| {
            sync_error!(
                ErrorKind::ConfigError,
                "trusted root certificates are not valid PEM",
                source: err
            )
        })?;
        root_store.add(cert)?;
    }

    Ok(ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth())
}

/// Quotes a channel name so any identifier can be listened to.
fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
