//! Job queue and background processing.
//!
//! [`Queue`] keeps jobs in process memory, ordered by priority, with delayed
//! jobs, exponential retry backoff and a dead-letter list. A [`Worker`] runs
//! registered handlers per job type and calls the job type's failed callback
//! once a job has used up its attempts.
//!
//! ```no_run
//! use tenantry_queue::*;
//!
//! # async fn example() -> QueueResult<()> {
//! let queue = Queue::new("provisioning");
//! let mut worker = Worker::new(queue.clone());
//!
//! worker.register_handler("send_welcome", |job| async move {
//!     tracing::info!(payload = %job.data, "sending welcome mail");
//!     Ok(())
//! })?;
//! worker.on_failed("send_welcome", |job, error| async move {
//!     tracing::error!(job_id = %job.id, %error, "giving up");
//! })?;
//!
//! queue.enqueue("send_welcome", serde_json::json!({"tenant": "acme"})).await?;
//! worker.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod job;
pub mod queue;
pub mod worker;

pub use error::{QueueError, QueueResult};
pub use job::{Job, JobData, JobId, JobPriority, JobState};
pub use queue::{DEFAULT_COMPLETED_HISTORY, Queue, QueueConfig};
pub use worker::{FailedHandler, JobHandler, JobOutcome, Worker, WorkerConfig};
