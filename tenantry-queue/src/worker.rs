//! Worker implementation for processing jobs.

use crate::error::{QueueError, QueueResult};
use crate::job::{Job, JobState};
use crate::queue::Queue;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Job handler function type.
pub type JobHandler =
    Arc<dyn Fn(Job) -> Pin<Box<dyn Future<Output = QueueResult<()>> + Send>> + Send + Sync>;

/// Callback run once a job has exhausted its attempts, with the last error.
pub type FailedHandler =
    Arc<dyn Fn(Job, String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent jobs to process
    pub concurrency: usize,

    /// Poll interval for checking new jobs
    pub poll_interval: Duration,

    /// Timeout for job execution
    pub job_timeout: Duration,

    /// Whether to log job execution
    pub log_execution: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval: Duration::from_secs(1),
            job_timeout: Duration::from_secs(300), // 5 minutes
            log_execution: true,
        }
    }
}

#[derive(Default)]
struct Registry {
    handlers: HashMap<String, JobHandler>,
    failed: HashMap<String, FailedHandler>,
}

/// Outcome of a single processed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Failed, rescheduled for another attempt
    Retrying,
    /// Failed for the last time
    Dead,
}

/// Worker for processing jobs from a queue.
pub struct Worker {
    queue: Queue,
    registry: Arc<Registry>,
    config: WorkerConfig,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Worker {
    /// Create a new worker.
    pub fn new(queue: Queue) -> Self {
        Self::with_config(queue, WorkerConfig::default())
    }

    /// Create a worker with custom configuration.
    pub fn with_config(queue: Queue, config: WorkerConfig) -> Self {
        Self {
            queue,
            registry: Arc::new(Registry::default()),
            config,
            running: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    fn registry_mut(&mut self) -> QueueResult<&mut Registry> {
        Arc::get_mut(&mut self.registry).ok_or(QueueError::WorkerAlreadyRunning)
    }

    /// Register a job handler.
    ///
    /// Handlers can only be registered while the worker is stopped.
    ///
    /// ```no_run
    /// use tenantry_queue::*;
    ///
    /// # fn example() -> QueueResult<()> {
    /// let mut worker = Worker::new(Queue::new("default"));
    ///
    /// worker.register_handler("send_email", |job| async move {
    ///     println!("Sending email: {:?}", job.data);
    ///     Ok(())
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn register_handler<F, Fut>(&mut self, job_type: impl Into<String>, handler: F) -> QueueResult<()>
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = QueueResult<()>> + Send + 'static,
    {
        let wrapped: JobHandler = Arc::new(
            move |job: Job| -> Pin<Box<dyn Future<Output = QueueResult<()>> + Send>> {
                Box::pin(handler(job))
            },
        );

        self.registry_mut()?.handlers.insert(job_type.into(), wrapped);
        Ok(())
    }

    /// Register the callback for jobs of `job_type` that run out of attempts.
    pub fn on_failed<F, Fut>(&mut self, job_type: impl Into<String>, callback: F) -> QueueResult<()>
    where
        F: Fn(Job, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let wrapped: FailedHandler = Arc::new(
            move |job: Job, error: String| -> Pin<Box<dyn Future<Output = ()> + Send>> {
                Box::pin(callback(job, error))
            },
        );

        self.registry_mut()?.failed.insert(job_type.into(), wrapped);
        Ok(())
    }

    pub fn has_handler(&self, job_type: &str) -> bool {
        self.registry.handlers.contains_key(job_type)
    }

    /// Process ready jobs on the current task until none are left.
    ///
    /// Jobs rescheduled with a non-zero backoff are not waited for.
    /// Returns the number of attempts made.
    pub async fn run_until_idle(&self) -> QueueResult<usize> {
        if self.is_running() {
            return Err(QueueError::WorkerAlreadyRunning);
        }

        let mut processed = 0;
        while let Some(job) = self.queue.dequeue().await? {
            process(&self.queue, &self.registry, job, &self.config).await?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Start the worker.
    pub async fn start(&mut self) -> QueueResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(QueueError::WorkerAlreadyRunning);
        }

        if self.config.log_execution {
            info!(
                queue = self.queue.name(),
                concurrency = self.config.concurrency,
                "Starting worker"
            );
        }

        for i in 0..self.config.concurrency.max(1) {
            let queue = self.queue.clone();
            let registry = self.registry.clone();
            let running = self.running.clone();
            let config = self.config.clone();

            let handle = tokio::spawn(async move {
                while running.load(Ordering::SeqCst) {
                    match queue.dequeue().await {
                        Ok(Some(job)) => {
                            if let Err(e) = process(&queue, &registry, job, &config).await {
                                error!(worker = i, error = %e, "Failed to record job result");
                            }
                        }
                        Ok(None) => {
                            let _ = tokio::time::timeout(config.poll_interval, queue.notified()).await;
                        }
                        Err(e) => {
                            error!(worker = i, error = %e, "Error dequeuing job");
                            tokio::time::sleep(config.poll_interval).await;
                        }
                    }
                }

                if config.log_execution {
                    debug!(worker = i, "Worker task stopped");
                }
            });

            self.handles.push(handle);
        }

        Ok(())
    }

    /// Stop the worker, letting in-flight jobs finish.
    pub async fn stop(&mut self) -> QueueResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(QueueError::WorkerNotRunning);
        }

        self.queue.wake_all();
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "Worker task ended abnormally");
            }
        }

        if self.config.log_execution {
            info!(queue = self.queue.name(), "Worker stopped");
        }

        Ok(())
    }

    /// Check if the worker is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

async fn process(
    queue: &Queue,
    registry: &Registry,
    job: Job,
    config: &WorkerConfig,
) -> QueueResult<JobOutcome> {
    let job_id = job.id;

    if config.log_execution {
        debug!(
            job_id = %job_id,
            job_type = %job.job_type,
            attempt = job.attempts,
            "Processing job"
        );
    }

    let result = match registry.handlers.get(&job.job_type) {
        Some(handler) => match tokio::time::timeout(config.job_timeout, handler(job.clone())).await {
            Ok(result) => result,
            Err(_) => Err(QueueError::Timeout(config.job_timeout)),
        },
        None => Err(QueueError::NoHandler(job.job_type.clone())),
    };

    match result {
        Ok(()) => {
            queue.complete(job_id).await?;
            if config.log_execution {
                debug!(job_id = %job_id, "Job completed");
            }
            Ok(JobOutcome::Completed)
        }
        Err(e) => {
            let message = e.to_string();
            warn!(job_id = %job_id, job_type = %job.job_type, error = %message, "Job failed");

            let updated = queue.fail(job_id, message.clone()).await?;
            if updated.state != JobState::Dead {
                return Ok(JobOutcome::Retrying);
            }

            if let Some(callback) = registry.failed.get(&updated.job_type) {
                callback(updated, message).await;
            }
            Ok(JobOutcome::Dead)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueConfig;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    fn immediate_queue() -> Queue {
        Queue::with_config(QueueConfig::new("default").with_retry_backoff(Duration::ZERO))
    }

    #[test]
    fn test_worker_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.concurrency, 4);
        assert!(config.log_execution);
    }

    #[tokio::test]
    async fn test_run_until_idle_completes_jobs() {
        let queue = immediate_queue();
        let mut worker = Worker::new(queue.clone());
        let counter = Arc::new(AtomicU32::new(0));

        let seen = counter.clone();
        worker
            .register_handler("count", move |_job| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();

        let id = queue.enqueue("count", json!({})).await.unwrap();
        queue.enqueue("count", json!({})).await.unwrap();

        assert_eq!(worker.run_until_idle().await.unwrap(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        let job = queue.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
    }

    #[tokio::test]
    async fn test_failed_callback_after_exhaustion() {
        let queue = immediate_queue();
        let mut worker = Worker::new(queue.clone());
        let failures: Arc<Mutex<Vec<(u32, String)>>> = Arc::default();

        worker
            .register_handler("broken", |_job| async {
                Err(QueueError::ExecutionFailed("disk full".to_string()))
            })
            .unwrap();
        let sink = failures.clone();
        worker
            .on_failed("broken", move |job, error| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push((job.attempts, error));
                }
            })
            .unwrap();

        queue
            .enqueue_job(Job::new("default", "broken", json!({})).with_max_attempts(3))
            .await
            .unwrap();

        assert_eq!(worker.run_until_idle().await.unwrap(), 3);
        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 3);
        assert!(failures[0].1.contains("disk full"));
    }

    #[tokio::test]
    async fn test_flaky_job_succeeds_on_retry() {
        let queue = immediate_queue();
        let mut worker = Worker::new(queue.clone());
        let called = Arc::new(AtomicBool::new(false));

        let flag = called.clone();
        worker
            .register_handler("flaky", move |job| {
                let flag = flag.clone();
                async move {
                    if job.attempts == 1 {
                        return Err(QueueError::ExecutionFailed("transient".to_string()));
                    }
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();
        let gave_up = Arc::new(AtomicBool::new(false));
        let gave_up_flag = gave_up.clone();
        worker
            .on_failed("flaky", move |_job, _error| {
                let gave_up_flag = gave_up_flag.clone();
                async move {
                    gave_up_flag.store(true, Ordering::SeqCst);
                }
            })
            .unwrap();

        queue.enqueue("flaky", json!({})).await.unwrap();
        assert_eq!(worker.run_until_idle().await.unwrap(), 2);
        assert!(called.load(Ordering::SeqCst));
        assert!(!gave_up.load(Ordering::SeqCst));
        assert!(queue.dead_letters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_handler_dead_letters() {
        let queue = immediate_queue();
        let worker = Worker::new(queue.clone());

        queue
            .enqueue_job(Job::new("default", "unknown", json!({})).with_max_attempts(1))
            .await
            .unwrap();

        worker.run_until_idle().await.unwrap();
        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert!(dead[0].last_error.as_deref().unwrap_or("").contains("unknown"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let queue = immediate_queue();
        let config = WorkerConfig {
            job_timeout: Duration::from_secs(1),
            log_execution: false,
            ..WorkerConfig::default()
        };
        let mut worker = Worker::with_config(queue.clone(), config);

        worker
            .register_handler("slow", |_job| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .unwrap();

        queue
            .enqueue_job(Job::new("default", "slow", json!({})).with_max_attempts(1))
            .await
            .unwrap();

        worker.run_until_idle().await.unwrap();
        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead[0].last_error.as_deref(), Some("job timed out after 1s"));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let queue = immediate_queue();
        let config = WorkerConfig {
            concurrency: 2,
            poll_interval: Duration::from_millis(10),
            ..WorkerConfig::default()
        };
        let mut worker = Worker::with_config(queue.clone(), config);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        worker
            .register_handler("ping", move |job| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(job.id);
                    Ok(())
                }
            })
            .unwrap();

        worker.start().await.unwrap();
        assert!(worker.is_running());
        assert!(matches!(worker.start().await, Err(QueueError::WorkerAlreadyRunning)));
        assert!(worker.register_handler("late", |_job| async { Ok(()) }).is_err());

        let id = queue.enqueue("ping", json!({})).await.unwrap();
        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(received, Some(id));

        worker.stop().await.unwrap();
        assert!(!worker.is_running());
        assert!(matches!(worker.stop().await, Err(QueueError::WorkerNotRunning)));
    }
}
