use thiserror::Error;

use crate::driver::DriverError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to interpret schedule request: {0}")]
    InterpretationFailed(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("unknown schedule id: {0}")]
    UnknownSchedule(String),
}
