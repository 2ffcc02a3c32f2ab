use std::time::Duration;

use docsync::pipeline::{Pipeline, PipelineMonitor, PipelineStats};
use docsync::store::DocumentStore;
use docsync::transport::channel::{ChannelSender, ChannelTransport};
use docsync_config::shared::PipelineConfig;

pub fn pipeline_config(partitions: u16) -> PipelineConfig {
    PipelineConfig {
        partitions,
        queue_capacity: 64,
        shutdown_drain_timeout_ms: 5_000,
        ..PipelineConfig::default()
    }
}

/// Starts a pipeline over `store` fed through the returned sender.
pub async fn start_pipeline<S>(
    config: PipelineConfig,
    store: S,
) -> (Pipeline<S, ChannelTransport>, ChannelSender)
where
    S: DocumentStore + Clone + Send + Sync + 'static,
{
    let (transport, sender) = ChannelTransport::new(64);
    let mut pipeline = Pipeline::new(config, store, transport);
    pipeline.start().await.unwrap();

    (pipeline, sender)
}

/// Sends every message in order.
pub async fn send_all(sender: &ChannelSender, messages: impl IntoIterator<Item = String>) {
    for message in messages {
        assert!(sender.send(message).await, "transport stopped early");
    }
}

/// Closes the feed and waits until everything sent was applied.
pub async fn drain<S>(pipeline: Pipeline<S, ChannelTransport>, sender: ChannelSender) -> PipelineStats
where
    S: DocumentStore + Clone + Send + Sync + 'static,
{
    let monitor = pipeline.monitor().unwrap();
    drop(sender);
    pipeline.wait().await.unwrap();

    monitor.stats()
}

/// Polls `monitor` until `condition` holds.
pub async fn wait_for_stats(monitor: &PipelineMonitor, condition: impl Fn(&PipelineStats) -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition(&monitor.stats()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("pipeline never reached the expected stats");
}
