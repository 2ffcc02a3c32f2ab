use std::sync::Arc;
use std::time::Duration;

use docsync_config::shared::PipelineConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

use crate::bail;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::error::{ErrorKind, SyncResult};
use crate::merge::MergeEngine;
use crate::store::DocumentStore;
use crate::sync_error;
use crate::transport::NotificationTransport;
use crate::workers::base::{Worker, WorkerHandle};
use crate::workers::partition::{PartitionWorker, PartitionWorkerState};
use crate::workers::pool::PartitionWorkerPool;
use crate::workers::router::{RouterWorker, RouterWorkerHandle, RouterWorkerState};

/// Lifecycle of a [`Pipeline`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    Created,
    Running,
    /// Shutdown was requested; queued changes may still be draining.
    Stopped,
}

/// Counters aggregated over the workers of a running pipeline.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: u64,
    pub dropped: u64,
    pub routed: u64,
    pub applied: u64,
    pub failed: u64,
}

/// Live view over the counters of a started pipeline's workers.
#[derive(Debug, Clone)]
pub struct PipelineMonitor {
    router: RouterWorkerState,
    partitions: Vec<PartitionWorkerState>,
}

impl PipelineMonitor {
    pub fn stats(&self) -> PipelineStats {
        let mut stats = PipelineStats {
            received: self.router.received(),
            dropped: self.router.dropped(),
            routed: self.router.routed(),
            ..PipelineStats::default()
        };
        for partition in &self.partitions {
            stats.applied += partition.applied();
            stats.failed += partition.failed();
        }

        stats
    }

    /// Returns the number of changes applied by each partition, in partition order.
    pub fn applied_per_partition(&self) -> Vec<u64> {
        self.partitions
            .iter()
            .map(PartitionWorkerState::applied)
            .collect()
    }
}

#[derive(Debug)]
enum PipelineState {
    NotStarted,
    Started {
        transport: JoinHandle<SyncResult<()>>,
        router: RouterWorkerHandle,
        pool: PartitionWorkerPool,
    },
}

/// Supervisor mirroring the changes of a [`NotificationTransport`] into a [`DocumentStore`].
///
/// Raw messages flow from the transport through a bounded queue into the router, which decodes
/// and projects them and hands each change to the partition worker owning the touched document.
/// Shutdown stops the transport; the router and the partitions then drain what was already
/// queued and exit, or are aborted once the drain timeout elapses.
#[derive(Debug)]
pub struct Pipeline<S, T> {
    config: Arc<PipelineConfig>,
    store: S,
    transport: Option<T>,
    state: PipelineState,
    shutdown_tx: ShutdownTx,
}

impl<S, T> Pipeline<S, T>
where
    S: DocumentStore + Clone + Send + Sync + 'static,
    T: NotificationTransport + Send + 'static,
{
    pub fn new(config: PipelineConfig, store: S, transport: T) -> Self {
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            config: Arc::new(config),
            store,
            transport: Some(transport),
            state: PipelineState::NotStarted,
            shutdown_tx,
        }
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    pub fn status(&self) -> PipelineStatus {
        if self.shutdown_tx.is_shutdown() {
            return PipelineStatus::Stopped;
        }

        match self.state {
            PipelineState::NotStarted => PipelineStatus::Created,
            PipelineState::Started { .. } => PipelineStatus::Running,
        }
    }

    /// Returns a monitor of the running workers, or `None` before start.
    ///
    /// The monitor outlives the pipeline, so counters can be read after [`Pipeline::wait`].
    pub fn monitor(&self) -> Option<PipelineMonitor> {
        let PipelineState::Started { router, pool, .. } = &self.state else {
            return None;
        };

        Some(PipelineMonitor {
            router: router.state(),
            partitions: pool.states(),
        })
    }

    /// Returns the counters of the running workers, or `None` before start.
    pub fn stats(&self) -> Option<PipelineStats> {
        self.monitor().map(|monitor| monitor.stats())
    }

    /// Spawns the transport, the router and the partition workers.
    pub async fn start(&mut self) -> SyncResult<()> {
        if self.shutdown_tx.is_shutdown() {
            bail!(
                ErrorKind::InvalidState,
                "pipeline was stopped before it started"
            );
        }

        let Some(transport) = self.transport.take() else {
            bail!(ErrorKind::InvalidState, "pipeline was already started");
        };

        info!(
            transport = T::name(),
            store = S::name(),
            partitions = self.config.partitions,
            queue_capacity = self.config.queue_capacity,
            "starting pipeline"
        );

        let queue_capacity = self.config.queue_capacity.max(1);

        let mut pool = PartitionWorkerPool::new();
        let mut partition_txs = Vec::with_capacity(usize::from(self.config.partitions));
        for partition in 0..self.config.partitions.max(1) {
            let (tx, rx) = mpsc::channel(queue_capacity);
            let handle = PartitionWorker::new(partition, MergeEngine::new(self.store.clone()), rx)
                .start()
                .await?;

            partition_txs.push(tx);
            pool.push(handle);
        }

        let (message_tx, message_rx) = mpsc::channel(queue_capacity);
        let router = RouterWorker::new(
            self.store.clone(),
            message_rx,
            partition_txs,
            self.config.routing_table_capacity,
        )
        .start()
        .await?;

        let span = tracing::info_span!("transport", name = T::name());
        let transport = tokio::spawn(
            transport
                .run(message_tx, self.shutdown_tx.subscribe())
                .instrument(span),
        );

        self.state = PipelineState::Started {
            transport,
            router,
            pool,
        };

        Ok(())
    }

    /// Waits for the pipeline to complete.
    ///
    /// The pipeline completes once the transport has stopped and everything it queued has been
    /// applied. Draining is bounded by the configured timeout, after which the remaining workers
    /// are aborted and their queued changes are lost.
    pub async fn wait(self) -> SyncResult<()> {
        let PipelineState::Started {
            transport,
            mut router,
            mut pool,
        } = self.state
        else {
            info!("pipeline was not started, nothing to wait for");

            return Ok(());
        };

        let mut errors = vec![];

        info!("waiting for transport to stop");

        let transport_result = transport.await.map_err(|err| {
            sync_error!(ErrorKind::WorkerPanic, "transport task panicked", source: err)
        });
        if let Err(err) = transport_result.and_then(|result| result) {
            error!(error = %err, "transport stopped with an error");
            errors.push(err);
        }

        // Whatever stopped the transport, nothing new can enter the pipeline anymore.
        self.shutdown_tx.shutdown();

        info!("waiting for queued changes to drain");

        let drain_timeout = Duration::from_millis(self.config.shutdown_drain_timeout_ms);
        let drained = tokio::time::timeout(drain_timeout, async {
            let router_result = router.join().await;
            let pool_result = pool.wait_all().await;

            (router_result, pool_result)
        })
        .await;

        match drained {
            Ok((router_result, pool_result)) => {
                if let Err(err) = router_result {
                    errors.push(err);
                }
                if let Err(err) = pool_result {
                    info!(failed = err.kinds().len(), "partition workers failed with an error");
                    errors.push(err);
                }
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.shutdown_drain_timeout_ms,
                    "drain timeout elapsed, forcing workers to stop"
                );
                router.abort();
                pool.abort_all();
            }
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        info!("pipeline stopped");

        Ok(())
    }

    /// Requests shutdown. Calling it again, or after the pipeline stopped, does nothing.
    pub fn shutdown(&self) {
        if self.shutdown_tx.shutdown() {
            info!("shutdown signal sent to the pipeline");
        } else {
            debug!("pipeline shutdown was already requested");
        }
    }

    pub async fn shutdown_and_wait(self) -> SyncResult<()> {
        self.shutdown();
        self.wait().await
    }
}
