use tracing::{debug, error};

use crate::error::SyncResult;
use crate::workers::base::WorkerHandle;
use crate::workers::partition::{PartitionWorkerHandle, PartitionWorkerState};

/// The partition workers of a pipeline, indexed by partition.
#[derive(Debug, Default)]
pub struct PartitionWorkerPool {
    workers: Vec<PartitionWorkerHandle>,
}

impl PartitionWorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the handle of the next partition.
    pub fn push(&mut self, handle: PartitionWorkerHandle) {
        debug!(partition = handle.partition(), "partition worker added to pool");
        self.workers.push(handle);
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Returns the state of every partition worker, in partition order.
    pub fn states(&self) -> Vec<PartitionWorkerState> {
        self.workers.iter().map(WorkerHandle::state).collect()
    }

    /// Waits for every partition worker to complete.
    ///
    /// All workers are awaited even when some fail; failures are returned together.
    pub async fn wait_all(&mut self) -> SyncResult<()> {
        let mut errors = Vec::new();

        for worker in &mut self.workers {
            if let Err(err) = worker.join().await {
                error!(partition = worker.partition(), error = %err, "partition worker completed with error");
                errors.push(err);
            }
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(())
    }

    /// Aborts every partition worker still running.
    pub fn abort_all(&self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}
