//! In-memory named job queue.

use crate::error::{QueueError, QueueResult};
use crate::job::{Job, JobData, JobId, JobPriority, JobState};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

/// Completed jobs a queue remembers by default.
pub const DEFAULT_COMPLETED_HISTORY: usize = 100;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue name
    pub queue_name: String,

    /// Maximum number of waiting jobs (0 = unlimited)
    pub max_size: usize,

    /// Base delay for exponential retry backoff (zero retries immediately)
    pub retry_backoff: Duration,

    /// Completed jobs kept for inspection; older ones are dropped
    pub completed_history: usize,
}

impl QueueConfig {
    /// Create a new queue configuration.
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            max_size: 0,
            retry_backoff: Duration::from_secs(1),
            completed_history: DEFAULT_COMPLETED_HISTORY,
        }
    }

    /// Set the maximum queue size.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the retry backoff base.
    pub fn with_retry_backoff(mut self, base: Duration) -> Self {
        self.retry_backoff = base;
        self
    }

    /// Set how many completed jobs stay retrievable.
    pub fn with_completed_history(mut self, completed_history: usize) -> Self {
        self.completed_history = completed_history;
        self
    }
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<JobId, Job>,
    ready: HashMap<JobPriority, VecDeque<JobId>>,
    delayed: Vec<JobId>,
    dead: Vec<JobId>,
    completed: VecDeque<JobId>,
}

impl QueueState {
    fn push_ready(&mut self, job: &Job) {
        self.ready.entry(job.priority).or_default().push_back(job.id);
    }

    fn remember_completed(&mut self, job_id: JobId, history: usize) {
        self.completed.push_back(job_id);
        while self.completed.len() > history {
            if let Some(old) = self.completed.pop_front() {
                self.jobs.remove(&old);
            }
        }
    }

    fn waiting(&self) -> usize {
        self.ready.values().map(VecDeque::len).sum::<usize>() + self.delayed.len()
    }

    fn promote_delayed(&mut self) {
        let jobs = &self.jobs;
        let (due, later): (Vec<JobId>, Vec<JobId>) = self
            .delayed
            .iter()
            .copied()
            .partition(|id| jobs.get(id).is_none_or(Job::is_ready));
        self.delayed = later;

        for id in due {
            if let Some(job) = self.jobs.get(&id) {
                let priority = job.priority;
                self.ready.entry(priority).or_default().push_back(id);
            }
        }
    }
}

/// Job queue held in process memory.
///
/// Cloning is cheap; clones share the same jobs.
#[derive(Clone)]
pub struct Queue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    config: Arc<QueueConfig>,
}

impl Queue {
    /// Create a new queue.
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self::with_config(QueueConfig::new(queue_name))
    }

    /// Create a queue with custom configuration.
    pub fn with_config(config: QueueConfig) -> Self {
        info!(queue = %config.queue_name, "Initializing job queue");
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
            config: Arc::new(config),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.queue_name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Enqueue a job.
    pub async fn enqueue(&self, job_type: impl Into<String>, data: JobData) -> QueueResult<JobId> {
        let job = Job::new(&self.config.queue_name, job_type, data);
        self.enqueue_job(job).await
    }

    /// Enqueue a prepared job.
    pub async fn enqueue_job(&self, mut job: Job) -> QueueResult<JobId> {
        let mut state = self.state.lock().await;

        if self.config.max_size > 0 && state.waiting() >= self.config.max_size {
            return Err(QueueError::QueueFull {
                queue: self.config.queue_name.clone(),
                max_size: self.config.max_size,
            });
        }

        job.queue = self.config.queue_name.clone();
        let job_id = job.id;
        debug!(
            queue = %self.config.queue_name,
            job_id = %job_id,
            job_type = %job.job_type,
            "Enqueueing job"
        );

        if job.is_ready() {
            state.push_ready(&job);
        } else {
            state.delayed.push(job_id);
        }
        state.jobs.insert(job_id, job);
        drop(state);

        self.notify.notify_one();
        Ok(job_id)
    }

    /// Take the next ready job, highest priority first, FIFO within a
    /// priority. The returned job is already marked as processing.
    pub async fn dequeue(&self) -> QueueResult<Option<Job>> {
        let mut state = self.state.lock().await;
        state.promote_delayed();

        for priority in JobPriority::ALL {
            let next = state.ready.get_mut(&priority).and_then(VecDeque::pop_front);
            if let Some(job_id) = next
                && let Some(job) = state.jobs.get_mut(&job_id)
            {
                job.start();
                return Ok(Some(job.clone()));
            }
        }

        Ok(None)
    }

    /// Mark a job as completed.
    pub async fn complete(&self, job_id: JobId) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id))?;
        job.complete();
        state.remember_completed(job_id, self.config.completed_history);
        Ok(())
    }

    /// Record a failed attempt. The job is rescheduled with backoff while
    /// attempts remain, otherwise it moves to the dead-letter list.
    ///
    /// Returns the job as updated.
    pub async fn fail(&self, job_id: JobId, error: String) -> QueueResult<Job> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id))?;

        let job_state = job.fail(error, self.config.retry_backoff);
        let snapshot = job.clone();
        match job_state {
            JobState::Dead => {
                state.dead.push(job_id);
                warn!(
                    queue = %self.config.queue_name,
                    job_id = %job_id,
                    job_type = %snapshot.job_type,
                    attempts = snapshot.attempts,
                    "Job moved to dead letters"
                );
            }
            _ if snapshot.is_ready() => state.push_ready(&snapshot),
            _ => state.delayed.push(job_id),
        }
        drop(state);

        if job_state != JobState::Dead {
            self.notify.notify_one();
        }
        Ok(snapshot)
    }

    /// Get a job by ID.
    pub async fn get_job(&self, job_id: JobId) -> QueueResult<Option<Job>> {
        Ok(self.state.lock().await.jobs.get(&job_id).cloned())
    }

    /// Number of jobs held in memory: waiting, running, dead and the
    /// completed history.
    pub async fn tracked(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    /// Number of jobs waiting to run, delayed ones included.
    pub async fn size(&self) -> QueueResult<usize> {
        Ok(self.state.lock().await.waiting())
    }

    /// Jobs that exhausted their attempts.
    pub async fn dead_letters(&self) -> QueueResult<Vec<Job>> {
        let state = self.state.lock().await;
        Ok(state
            .dead
            .iter()
            .filter_map(|id| state.jobs.get(id).cloned())
            .collect())
    }

    /// Put a dead job back with a fresh attempt budget.
    pub async fn retry_dead(&self, job_id: JobId) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        let position = state
            .dead
            .iter()
            .position(|id| *id == job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id))?;
        state.dead.remove(position);

        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id))?;
        job.revive();
        let snapshot = job.clone();
        state.push_ready(&snapshot);
        drop(state);

        self.notify.notify_one();
        Ok(())
    }

    /// Clear all jobs from the queue.
    pub async fn clear(&self) -> QueueResult<()> {
        *self.state.lock().await = QueueState::default();
        Ok(())
    }

    /// Wait until a job is enqueued or rescheduled.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    pub(crate) fn wake_all(&self) {
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fifo_within_priority() {
        let queue = Queue::new("default");
        let first = queue.enqueue("task", json!({"n": 1})).await.unwrap();
        let second = queue.enqueue("task", json!({"n": 2})).await.unwrap();

        assert_eq!(queue.dequeue().await.unwrap().unwrap().id, first);
        assert_eq!(queue.dequeue().await.unwrap().unwrap().id, second);
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_priority_order() {
        let queue = Queue::new("default");
        queue.enqueue("low", json!({})).await.unwrap();
        queue
            .enqueue_job(Job::new("x", "critical", json!({})).with_priority(JobPriority::Critical))
            .await
            .unwrap();

        let job = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(job.job_type, "critical");
        assert_eq!(job.queue, "default");
        assert_eq!(job.state, JobState::Processing);
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn test_delayed_jobs_wait() {
        let queue = Queue::new("default");
        queue
            .enqueue_job(Job::new("default", "later", json!({})).delayed(Duration::from_secs(3600)))
            .await
            .unwrap();

        assert_eq!(queue.size().await.unwrap(), 1);
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_immediate_retry_then_dead_letter() {
        let queue = Queue::with_config(QueueConfig::new("default").with_retry_backoff(Duration::ZERO));
        let id = queue
            .enqueue_job(Job::new("default", "flaky", json!({})).with_max_attempts(2))
            .await
            .unwrap();

        let job = queue.dequeue().await.unwrap().unwrap();
        let failed = queue.fail(job.id, "first".to_string()).await.unwrap();
        assert_eq!(failed.state, JobState::Failed);

        let job = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(job.attempts, 2);
        let dead = queue.fail(job.id, "second".to_string()).await.unwrap();
        assert_eq!(dead.state, JobState::Dead);

        assert!(queue.dequeue().await.unwrap().is_none());
        let letters = queue.dead_letters().await.unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].id, id);
        assert_eq!(letters[0].last_error.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_backoff_delays_retry() {
        let queue = Queue::new("default");
        queue.enqueue("flaky", json!({})).await.unwrap();

        let job = queue.dequeue().await.unwrap().unwrap();
        let failed = queue.fail(job.id, "boom".to_string()).await.unwrap();

        assert!(failed.run_at.is_some());
        assert!(queue.dequeue().await.unwrap().is_none());
        assert_eq!(queue.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retry_dead() {
        let queue = Queue::new("default");
        let id = queue
            .enqueue_job(Job::new("default", "once", json!({})).with_max_attempts(1))
            .await
            .unwrap();

        queue.dequeue().await.unwrap();
        queue.fail(id, "boom".to_string()).await.unwrap();
        queue.retry_dead(id).await.unwrap();

        assert!(queue.dead_letters().await.unwrap().is_empty());
        let job = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn test_max_size() {
        let queue = Queue::with_config(QueueConfig::new("default").with_max_size(1));
        queue.enqueue("a", json!({})).await.unwrap();

        assert!(matches!(
            queue.enqueue("b", json!({})).await,
            Err(QueueError::QueueFull { max_size: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_completed_jobs_are_not_kept_forever() {
        let queue = Queue::with_config(QueueConfig::new("default").with_completed_history(10));
        let mut ids = Vec::new();

        for n in 0..1_000 {
            let id = queue.enqueue("task", json!({"n": n})).await.unwrap();
            let job = queue.dequeue().await.unwrap().unwrap();
            queue.complete(job.id).await.unwrap();
            ids.push(id);
        }

        assert_eq!(queue.size().await.unwrap(), 0);
        assert_eq!(queue.tracked().await, 10);
        assert!(queue.get_job(ids[0]).await.unwrap().is_none());

        let last = queue.get_job(ids[999]).await.unwrap().unwrap();
        assert_eq!(last.state, JobState::Completed);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let queue = Queue::new("default");
        assert!(matches!(
            queue.complete(uuid::Uuid::new_v4()).await,
            Err(QueueError::JobNotFound(_))
        ));
    }
}
