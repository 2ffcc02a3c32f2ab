use docsync::pipeline::Pipeline;
use docsync::store::DocumentStore;
use docsync::store::elasticsearch::ElasticsearchStore;
use docsync::transport::NotificationTransport;
use docsync::transport::postgres::PgNotifyTransport;
use docsync_config::shared::ReplicatorConfig;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};

use crate::error::ReplicatorResult;

/// Starts the replicator with the provided configuration.
///
/// Prepares the index, wires the notification transport into the pipeline and runs it until a
/// shutdown signal is received and the queued changes are drained.
pub async fn start_replicator_with_config(config: ReplicatorConfig) -> ReplicatorResult<()> {
    info!(
        channel = %config.source.channel,
        index = %config.index.index,
        partitions = config.pipeline.partitions,
        "starting replicator"
    );

    let store = ElasticsearchStore::new(config.index)?;
    store.ensure_index().await?;

    let transport = PgNotifyTransport::new(config.source);
    let pipeline = Pipeline::new(config.pipeline, store, transport);

    start_pipeline(pipeline).await?;

    info!("replicator stopped");

    Ok(())
}

/// Starts a pipeline and stops it gracefully on SIGTERM or SIGINT.
#[tracing::instrument(skip(pipeline))]
async fn start_pipeline<S, T>(mut pipeline: Pipeline<S, T>) -> ReplicatorResult<()>
where
    S: DocumentStore + Clone + Send + Sync + 'static,
    T: NotificationTransport + Send + 'static,
{
    pipeline.start().await?;

    let mut sigterm = signal(SignalKind::terminate())?;
    let shutdown_tx = pipeline.shutdown_tx();
    let shutdown_handle = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("sigint (ctrl+c) received, shutting down pipeline");
            }
            _ = sigterm.recv() => {
                info!("sigterm received, shutting down pipeline");
            }
        }

        if !shutdown_tx.shutdown() {
            warn!("pipeline shutdown was already requested");
        }
    });

    let result = pipeline.wait().await;

    // If the pipeline stopped on its own the signal task is still waiting.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    result?;

    Ok(())
}
