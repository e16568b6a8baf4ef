//! Postgres broker delegating to [`JobRepository`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use taskhub_core::error::AppError;
use taskhub_core::result::AppResult;
use taskhub_core::traits::Clock;
use taskhub_database::repositories::JobRepository;
use taskhub_entity::job::{Job, NewJob, QueueCounts, QueueName};

use super::{EnqueueOutcome, JobBroker, JobRef, lease_deadline};

/// Durable broker on the `jobs` table.
///
/// Claims use `FOR UPDATE SKIP LOCKED`; dedupe uniqueness is enforced by a
/// partial unique index over live jobs.
#[derive(Debug, Clone)]
pub struct PgBroker {
    repo: Arc<JobRepository>,
    clock: Arc<dyn Clock>,
}

impl PgBroker {
    /// Create a broker over the given repository.
    pub fn new(repo: Arc<JobRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }
}

#[async_trait]
impl JobBroker for PgBroker {
    async fn enqueue(&self, new_job: NewJob) -> AppResult<EnqueueOutcome> {
        let job = new_job.into_job(Uuid::now_v7(), self.clock.now());

        // The key holder may finish between the conflict and the lookup;
        // a second insert then succeeds.
        for _ in 0..2 {
            if let Some(stored) = self.repo.insert(&job).await? {
                return Ok(EnqueueOutcome::Created(stored));
            }
            let Some(key) = job.dedupe_key.as_deref() else {
                break;
            };
            if let Some(existing) = self.repo.find_live_by_dedupe_key(&job.queue, key).await? {
                debug!(queue = %job.queue, dedupe_key = %key, %existing, "Dedupe key already held");
                return Ok(EnqueueOutcome::Duplicate { existing });
            }
        }
        Err(AppError::conflict(format!(
            "Job {} could not be stored in queue '{}'",
            job.id, job.queue
        )))
    }

    async fn claim_next(
        &self,
        queue: QueueName,
        worker_id: &str,
        lease: Duration,
    ) -> AppResult<Option<Job>> {
        let now = self.clock.now();
        self.repo
            .claim_next(queue.as_str(), worker_id, lease_deadline(now, lease), now)
            .await
    }

    async fn renew_lease(&self, job_id: Uuid, worker_id: &str, lease: Duration) -> AppResult<bool> {
        let now = self.clock.now();
        self.repo
            .renew_lease(job_id, worker_id, lease_deadline(now, lease), now)
            .await
    }

    async fn ack_success(
        &self,
        job_id: Uuid,
        worker_id: &str,
        result: Option<Value>,
    ) -> AppResult<bool> {
        self.repo
            .complete(job_id, worker_id, result.as_ref(), self.clock.now())
            .await
    }

    async fn ack_failure(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> AppResult<bool> {
        let now = self.clock.now();
        match retry_at {
            Some(at) => self.repo.reschedule(job_id, worker_id, error, at, now).await,
            None => self.repo.fail(job_id, worker_id, error, now).await,
        }
    }

    async fn cancel(&self, queue: QueueName, target: &JobRef) -> AppResult<bool> {
        let now = self.clock.now();
        match target {
            JobRef::Id(id) => self.repo.cancel_by_id(queue.as_str(), *id, now).await,
            JobRef::DedupeKey(key) => {
                self.repo
                    .cancel_by_dedupe_key(queue.as_str(), key, now)
                    .await
            }
        }
    }

    async fn get(&self, job_id: Uuid) -> AppResult<Option<Job>> {
        self.repo.find_by_id(job_id).await
    }

    async fn counts(&self, queue: QueueName) -> AppResult<QueueCounts> {
        self.repo.counts(queue.as_str(), self.clock.now()).await
    }

    async fn prune_completed(&self, before: DateTime<Utc>) -> AppResult<u64> {
        self.repo.prune_finished(before).await
    }
}
