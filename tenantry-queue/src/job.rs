//! Jobs and their attempt bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

pub type JobId = Uuid;

/// JSON payload carried by a job.
pub type JobData = serde_json::Value;

/// Upper bound for retry backoff.
pub const MAX_BACKOFF: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum JobPriority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl JobPriority {
    /// Dequeue order, highest first.
    pub const ALL: [JobPriority; 4] = [
        JobPriority::Critical,
        JobPriority::High,
        JobPriority::Normal,
        JobPriority::Low,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    /// Last attempt failed, another one is scheduled
    Failed,
    /// Out of attempts
    Dead,
}

/// A unit of work on a [`Queue`](crate::Queue).
///
/// The handler is picked by `job_type`; `data` is the handler's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: String,
    pub data: JobData,
    pub priority: JobPriority,
    pub state: JobState,

    /// Error of the most recent failed attempt
    pub last_error: Option<String>,

    /// Attempts started so far
    pub attempts: u32,
    pub max_attempts: u32,

    /// Owning queue, set on enqueue
    pub queue: String,

    pub created_at: DateTime<Utc>,

    /// Earliest time the next attempt may start
    pub run_at: Option<DateTime<Utc>>,

    pub started_at: Option<DateTime<Utc>>,

    /// When the job completed or died
    pub finished_at: Option<DateTime<Utc>>,

    /// Free-form tags, e.g. the tenant a job works for
    pub metadata: HashMap<String, String>,
}

impl Job {
    pub fn new(queue: impl Into<String>, job_type: impl Into<String>, data: JobData) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: job_type.into(),
            data,
            priority: JobPriority::default(),
            state: JobState::Pending,
            last_error: None,
            attempts: 0,
            max_attempts: 3,
            queue: queue.into(),
            created_at: Utc::now(),
            run_at: None,
            started_at: None,
            finished_at: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Attempts allowed before the job dies. Zero is treated as one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Do not start before `time`.
    pub fn not_before(mut self, time: DateTime<Utc>) -> Self {
        self.run_at = Some(time);
        self
    }

    /// Do not start before `delay` has passed.
    pub fn delayed(self, delay: Duration) -> Self {
        self.not_before(Utc::now() + to_chrono(delay))
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Decode the payload.
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> crate::QueueResult<T> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| crate::QueueError::Deserialization(format!("{}: {e}", self.job_type)))
    }

    pub fn is_ready(&self) -> bool {
        self.run_at.is_none_or(|at| Utc::now() >= at)
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    pub(crate) fn start(&mut self) {
        self.state = JobState::Processing;
        self.started_at = Some(Utc::now());
        self.attempts += 1;
    }

    pub(crate) fn complete(&mut self) {
        self.state = JobState::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Record a failed attempt. While attempts remain the job is rescheduled
    /// after [`backoff_delay`](Self::backoff_delay), otherwise it is dead.
    pub(crate) fn fail(&mut self, error: String, backoff: Duration) -> JobState {
        self.last_error = Some(error);
        if self.can_retry() {
            let delay = self.backoff_delay(backoff);
            self.state = JobState::Failed;
            self.run_at = (!delay.is_zero()).then(|| Utc::now() + to_chrono(delay));
        } else {
            self.state = JobState::Dead;
            self.finished_at = Some(Utc::now());
        }
        self.state
    }

    /// Back to pending with a fresh attempt budget.
    pub(crate) fn revive(&mut self) {
        self.state = JobState::Pending;
        self.attempts = 0;
        self.run_at = None;
        self.finished_at = None;
    }

    /// `base * 2^(attempts - 1)`, capped at [`MAX_BACKOFF`].
    pub fn backoff_delay(&self, base: Duration) -> Duration {
        let exponent = self.attempts.saturating_sub(1).min(20);
        base.saturating_mul(1 << exponent).min(MAX_BACKOFF)
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
