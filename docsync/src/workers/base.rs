use std::fmt;
use std::future::Future;

use crate::error::SyncResult;

/// Kinds of workers run by the pipeline, used in logs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WorkerType {
    /// Decodes, projects and routes messages to partitions.
    Router,
    /// Applies the changes of the owners hashed to one partition.
    Partition { partition: u16 },
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerType::Router => f.write_str("router"),
            WorkerType::Partition { partition } => write!(f, "partition_{partition}"),
        }
    }
}

/// A background worker that can be started once.
///
/// `H` is the handle returned on start and `S` the state observable through it.
pub trait Worker<H, S>
where
    H: WorkerHandle<S>,
{
    /// Error type returned when worker startup fails.
    type Error;

    /// Spawns the worker and returns its handle.
    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// Handle of a running worker.
pub trait WorkerHandle<S> {
    /// Returns a snapshot of the worker's state.
    fn state(&self) -> S;

    /// Waits for the worker to complete, consuming the handle.
    fn wait(self) -> impl Future<Output = SyncResult<()>> + Send;
}
