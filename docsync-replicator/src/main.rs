//! Replicator service binary.
//!
//! Listens to row change notifications of the source database and mirrors them into the
//! per-owner documents of the search index until it receives SIGTERM or SIGINT.

use docsync_config::shared::ReplicatorConfig;
use docsync_telemetry::metrics::init_metrics;
use docsync_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::config::load_replicator_config;
use crate::core::start_replicator_with_config;
use crate::error::{ReplicatorError, ReplicatorResult};

mod config;
mod core;
mod error;

fn main() -> ReplicatorResult<()> {
    let replicator_config = load_replicator_config()?;

    let _log_flusher =
        init_tracing(env!("CARGO_BIN_NAME")).map_err(ReplicatorError::telemetry)?;

    match replicator_config.metrics_port {
        Some(port) => {
            init_metrics(port).map_err(ReplicatorError::telemetry)?;
            info!(port, "metrics exporter listening");
        }
        None => info!("metrics port not configured, metrics are not exported"),
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(replicator_config))?;

    Ok(())
}

async fn async_main(replicator_config: ReplicatorConfig) -> ReplicatorResult<()> {
    if let Err(err) = start_replicator_with_config(replicator_config).await {
        error!("{}", err.render_report());

        return Err(err);
    }

    Ok(())
}
