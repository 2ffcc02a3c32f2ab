use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::merge::MergeEngine;
use crate::metrics::{DOCSYNC_EVENTS_FAILED_TOTAL, ERROR_KIND_LABEL};
use crate::store::DocumentStore;
use crate::sync_error;
use crate::types::{EntityChange, OwnerId};
use crate::workers::base::{Worker, WorkerHandle, WorkerType};

/// A change routed to the partition owning `owner_id`.
///
/// The change is applied to `owner_id`'s document only, so a change touching several owners
/// can be fanned out to several partitions without two of them writing the same document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedChange {
    pub owner_id: OwnerId,
    pub change: EntityChange,
}

/// Counters of a partition worker, shared with its handle.
#[derive(Debug, Clone, Default)]
pub struct PartitionWorkerState {
    applied: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl PartitionWorkerState {
    /// Returns the number of changes applied successfully.
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    /// Returns the number of changes whose application failed.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Handle of a running [`PartitionWorker`].
#[derive(Debug)]
pub struct PartitionWorkerHandle {
    partition: u16,
    state: PartitionWorkerState,
    handle: Option<JoinHandle<SyncResult<()>>>,
}

impl PartitionWorkerHandle {
    pub fn partition(&self) -> u16 {
        self.partition
    }

    /// Waits for the worker without consuming the handle, so the wait can be abandoned and
    /// the worker aborted afterwards.
    pub async fn join(&mut self) -> SyncResult<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };

        let result = handle.await;
        self.handle = None;

        result.map_err(|err| {
            if err.is_cancelled() {
                sync_error!(
                    ErrorKind::WorkerPanic,
                    "partition worker was aborted",
                    format!("partition {}", self.partition)
                )
            } else {
                sync_error!(
                    ErrorKind::WorkerPanic,
                    "partition worker panicked",
                    format!("partition {}", self.partition),
                    source: err
                )
            }
        })?
    }

    /// Aborts the worker if it is still running.
    pub fn abort(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

impl WorkerHandle<PartitionWorkerState> for PartitionWorkerHandle {
    fn state(&self) -> PartitionWorkerState {
        self.state.clone()
    }

    async fn wait(mut self) -> SyncResult<()> {
        self.join().await
    }
}

/// Worker applying, in arrival order, the changes routed to one partition.
///
/// A failing change is logged and counted, then the worker moves on to the next one. The
/// worker stops once its queue is closed and empty.
#[derive(Debug)]
pub struct PartitionWorker<S> {
    partition: u16,
    engine: MergeEngine<S>,
    rx: mpsc::Receiver<RoutedChange>,
}

impl<S> PartitionWorker<S> {
    pub fn new(partition: u16, engine: MergeEngine<S>, rx: mpsc::Receiver<RoutedChange>) -> Self {
        Self {
            partition,
            engine,
            rx,
        }
    }
}

impl<S> Worker<PartitionWorkerHandle, PartitionWorkerState> for PartitionWorker<S>
where
    S: DocumentStore + Clone + Send + Sync + 'static,
{
    type Error = SyncError;

    async fn start(mut self) -> SyncResult<PartitionWorkerHandle> {
        let partition = self.partition;
        let worker_type = WorkerType::Partition { partition };
        let state = PartitionWorkerState::default();
        let worker_state = state.clone();

        let span = tracing::info_span!("partition_worker", partition);
        let worker = async move {
            info!(%worker_type, "starting partition worker");

            while let Some(RoutedChange { owner_id, change }) = self.rx.recv().await {
                let change_name = change.name();
                match self.engine.apply_scoped(change, Some(owner_id)).await {
                    Ok(outcome) => {
                        debug!(owner_id, change = change_name, ?outcome, "change merged");
                        worker_state.applied.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => {
                        if err.kind().is_store() {
                            error!(owner_id, change = change_name, error = %err, "failed to apply change");
                        } else {
                            warn!(owner_id, change = change_name, error = %err, "change could not be applied");
                        }
                        worker_state.failed.fetch_add(1, Ordering::Relaxed);
                        counter!(DOCSYNC_EVENTS_FAILED_TOTAL, ERROR_KIND_LABEL => err.kind().as_label())
                            .increment(1);
                    }
                }
            }

            info!(%worker_type, "partition queue drained, stopping partition worker");

            Ok(())
        }
        .instrument(span);

        Ok(PartitionWorkerHandle {
            partition,
            state,
            handle: Some(tokio::spawn(worker)),
        })
    }
}
