//! Queue errors

use crate::job::JobId;
use std::time::Duration;
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("cannot encode job payload: {0}")]
    Serialization(String),

    #[error("cannot decode job payload: {0}")]
    Deserialization(String),

    #[error("job {0} not found")]
    JobNotFound(JobId),

    /// A handler reported failure for this attempt
    #[error("job failed: {0}")]
    ExecutionFailed(String),

    #[error("no handler registered for job type '{0}'")]
    NoHandler(String),

    #[error("worker is not running")]
    WorkerNotRunning,

    /// Also returned when registering handlers on a started worker
    #[error("worker is already running")]
    WorkerAlreadyRunning,

    #[error("queue '{queue}' is full ({max_size} jobs waiting)")]
    QueueFull { queue: String, max_size: usize },

    #[error("job timed out after {0:?}")]
    Timeout(Duration),
}
