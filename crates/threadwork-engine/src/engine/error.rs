use thiserror::Error;

use crate::driver::DriverError;
use crate::queue::QueueError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The inbound event queue is at its configured capacity.
    #[error("event queue is at capacity ({0})")]
    QueueFull(usize),

    /// Storage was unreachable at startup; the engine refuses to start
    /// rather than run with an unusable backing store (§7).
    #[error("engine failed to start: {0}")]
    StartupFailed(#[source] anyhow::Error),

    /// A workflow executor exceeded its configured timeout.
    #[error("workflow '{0}' timed out")]
    WorkflowTimedOut(String),
}
