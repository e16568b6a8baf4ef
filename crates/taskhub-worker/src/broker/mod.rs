//! Durable, time-ordered job storage with atomic claims.
//!
//! Every implementation must provide the same guarantees: a claimed job is
//! invisible to other workers until its lease lapses, and at most one
//! scheduled or active job per queue holds a given dedupe key.

pub mod memory;
pub mod postgres;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use taskhub_core::result::AppResult;
use taskhub_entity::job::{Job, NewJob, QueueCounts, QueueName};

pub use memory::InMemoryBroker;
pub use postgres::PgBroker;

/// Result of an enqueue attempt.
#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    /// The job was stored.
    Created(Job),
    /// A live job in the same queue already holds the dedupe key.
    Duplicate {
        /// ID of the job holding the key.
        existing: Uuid,
    },
}

/// How a cancellation addresses its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRef {
    /// By job ID.
    Id(Uuid),
    /// By dedupe key within the queue.
    DedupeKey(String),
}

/// Storage contract the queue client and worker pools are built on.
#[async_trait]
pub trait JobBroker: Send + Sync + Debug {
    /// Store a new job, honoring dedupe-key uniqueness.
    async fn enqueue(&self, job: NewJob) -> AppResult<EnqueueOutcome>;

    /// Atomically claim the next eligible job of `queue`.
    ///
    /// Candidates are scheduled jobs whose eligibility time has passed and
    /// active jobs whose lease lapsed, ordered by eligibility, priority,
    /// then creation. The claim increments `attempts` and sets the lease.
    async fn claim_next(
        &self,
        queue: QueueName,
        worker_id: &str,
        lease: Duration,
    ) -> AppResult<Option<Job>>;

    /// Extend the lease of a job still owned by `worker_id`.
    async fn renew_lease(&self, job_id: Uuid, worker_id: &str, lease: Duration) -> AppResult<bool>;

    /// Mark an owned job as completed.
    async fn ack_success(
        &self,
        job_id: Uuid,
        worker_id: &str,
        result: Option<Value>,
    ) -> AppResult<bool>;

    /// Record a failed attempt of an owned job.
    ///
    /// `Some(retry_at)` puts the job back to scheduled; `None` fails it for good.
    async fn ack_failure(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> AppResult<bool>;

    /// Cancel a scheduled job. Returns whether one was cancelled.
    async fn cancel(&self, queue: QueueName, target: &JobRef) -> AppResult<bool>;

    /// Fetch a job by ID.
    async fn get(&self, job_id: Uuid) -> AppResult<Option<Job>>;

    /// Count jobs of a queue by state.
    async fn counts(&self, queue: QueueName) -> AppResult<QueueCounts>;

    /// Drop completed and cancelled jobs last updated before `before`.
    async fn prune_completed(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

pub(crate) fn lease_deadline(now: DateTime<Utc>, lease: Duration) -> DateTime<Utc> {
    now + chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::seconds(30))
}
