//! Typed queue client for enqueuing, cancelling, and inspecting jobs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing;
use uuid::Uuid;

use taskhub_core::error::AppError;
use taskhub_core::result::AppResult;
use taskhub_core::traits::Clock;
use taskhub_entity::job::{BackoffPolicy, Job, JobPriority, JobType, NewJob, QueueCounts, QueueName};

use crate::broker::{EnqueueOutcome, JobBroker, JobRef};

/// Errors returned by [`QueueClient::enqueue`].
#[derive(Debug, Error)]
pub enum QueueError {
    /// A live job in the queue already holds the dedupe key.
    ///
    /// Callers that only need "a job exists" may treat this as success.
    #[error("Job with dedupe key '{dedupe_key}' already queued in '{queue}' as {existing}")]
    DuplicateJob {
        /// Queue the enqueue targeted.
        queue: QueueName,
        /// The colliding key.
        dedupe_key: String,
        /// ID of the job holding the key.
        existing: Uuid,
    },

    /// The broker rejected the call or could not be reached.
    #[error(transparent)]
    Broker(#[from] AppError),
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Broker(e) => e,
            duplicate @ QueueError::DuplicateJob { .. } => AppError::conflict(duplicate.to_string()),
        }
    }
}

/// Per-call enqueue options.
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    /// Delay before the job becomes eligible. Zero or negative means now.
    pub delay: chrono::Duration,
    /// Absolute eligibility time; takes precedence over `delay`.
    pub run_at: Option<DateTime<Utc>>,
    /// Priority among simultaneously eligible jobs.
    pub priority: JobPriority,
    /// Optional dedupe key.
    pub dedupe_key: Option<String>,
    /// Maximum attempts, at least one.
    pub max_attempts: u32,
    /// Delay curve between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            delay: chrono::Duration::zero(),
            run_at: None,
            priority: JobPriority::Medium,
            dedupe_key: None,
            max_attempts: 1,
            backoff: BackoffPolicy::fixed(std::time::Duration::ZERO),
        }
    }
}

/// Client bound to one named queue.
#[derive(Debug, Clone)]
pub struct QueueClient {
    queue: QueueName,
    broker: Arc<dyn JobBroker>,
    clock: Arc<dyn Clock>,
}

impl QueueClient {
    /// Create a client for `queue`.
    pub fn new(queue: QueueName, broker: Arc<dyn JobBroker>, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue,
            broker,
            clock,
        }
    }

    /// The queue this client addresses.
    pub fn name(&self) -> QueueName {
        self.queue
    }

    /// The broker behind this client.
    pub fn broker(&self) -> &Arc<dyn JobBroker> {
        &self.broker
    }

    /// Current time as seen by this client.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Enqueue a job and return its ID.
    pub async fn enqueue<P: Serialize>(
        &self,
        job_type: JobType,
        payload: &P,
        options: EnqueueOptions,
    ) -> Result<Uuid, QueueError> {
        let run_at = options
            .run_at
            .unwrap_or_else(|| self.clock.now() + options.delay.max(chrono::Duration::zero()));
        let new_job = NewJob {
            queue: self.queue.as_str().to_string(),
            job_type: job_type.as_str().to_string(),
            payload: serde_json::to_value(payload).map_err(AppError::from)?,
            dedupe_key: options.dedupe_key.clone(),
            run_at,
            priority: options.priority.value(),
            max_attempts: options.max_attempts.clamp(1, i32::MAX as u32) as i32,
            backoff: options.backoff,
        };

        match self.broker.enqueue(new_job).await? {
            EnqueueOutcome::Created(job) => {
                tracing::debug!(
                    job_id = %job.id,
                    queue = %self.queue,
                    job_type = %job.job_type,
                    run_at = %job.run_at,
                    priority = job.priority,
                    "Enqueued job"
                );
                Ok(job.id)
            }
            EnqueueOutcome::Duplicate { existing } => Err(QueueError::DuplicateJob {
                queue: self.queue,
                dedupe_key: options.dedupe_key.unwrap_or_default(),
                existing,
            }),
        }
    }

    /// Cancel the scheduled job holding `dedupe_key`.
    ///
    /// Returns `false` when no such job exists; that is never an error.
    pub async fn cancel(&self, dedupe_key: &str) -> AppResult<bool> {
        let removed = self
            .broker
            .cancel(self.queue, &JobRef::DedupeKey(dedupe_key.to_string()))
            .await?;
        tracing::debug!(queue = %self.queue, dedupe_key, removed, "Cancel by dedupe key");
        Ok(removed)
    }

    /// Fetch a job by ID.
    pub async fn get(&self, job_id: Uuid) -> AppResult<Option<Job>> {
        self.broker.get(job_id).await
    }

    /// Per-state job counts for this queue.
    pub async fn health(&self) -> AppResult<QueueCounts> {
        self.broker.counts(self.queue).await
    }
}
