//! In-process broker backed by a mutex-guarded map.
//!
//! Offers the same claim, lease, and dedupe guarantees as the Postgres
//! broker within a single process. Jobs do not survive a restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use taskhub_core::result::AppResult;
use taskhub_core::traits::Clock;
use taskhub_entity::job::{Job, JobState, NewJob, QueueCounts, QueueName};

use super::{EnqueueOutcome, JobBroker, JobRef, lease_deadline};

/// Broker keeping all jobs in memory.
#[derive(Debug)]
pub struct InMemoryBroker {
    jobs: Mutex<HashMap<Uuid, Job>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryBroker {
    /// Create an empty broker reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Snapshot of every job of a queue, oldest first.
    pub fn jobs_in(&self, queue: QueueName) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .lock()
            .values()
            .filter(|job| job.queue == queue.as_str())
            .cloned()
            .collect();
        jobs.sort_by_key(|job| (job.created_at, job.id));
        jobs
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Job>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `update` to a job that is active and leased by `worker_id`.
    fn with_owned_job(&self, job_id: Uuid, worker_id: &str, update: impl FnOnce(&mut Job)) -> bool {
        let mut jobs = self.lock();
        match jobs.get_mut(&job_id) {
            Some(job)
                if job.state == JobState::Active
                    && job.lease_owner.as_deref() == Some(worker_id) =>
            {
                update(job);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl JobBroker for InMemoryBroker {
    async fn enqueue(&self, new_job: NewJob) -> AppResult<EnqueueOutcome> {
        let now = self.clock.now();
        let mut jobs = self.lock();

        if let Some(key) = new_job.dedupe_key.as_deref() {
            let holder = jobs.values().find(|job| {
                job.queue == new_job.queue
                    && job.state.holds_dedupe_key()
                    && job.dedupe_key.as_deref() == Some(key)
            });
            if let Some(existing) = holder {
                return Ok(EnqueueOutcome::Duplicate {
                    existing: existing.id,
                });
            }
        }

        let job = new_job.into_job(Uuid::now_v7(), now);
        jobs.insert(job.id, job.clone());
        Ok(EnqueueOutcome::Created(job))
    }

    async fn claim_next(
        &self,
        queue: QueueName,
        worker_id: &str,
        lease: Duration,
    ) -> AppResult<Option<Job>> {
        let now = self.clock.now();
        let mut jobs = self.lock();

        let next = jobs
            .values()
            .filter(|job| job.queue == queue.as_str() && job.is_claimable(now))
            .min_by_key(|job| (job.eligible_at(), job.priority, job.created_at, job.id))
            .map(|job| job.id);

        let Some(id) = next else {
            return Ok(None);
        };
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };
        job.state = JobState::Active;
        job.attempts += 1;
        job.lease_owner = Some(worker_id.to_string());
        job.lease_expires_at = Some(lease_deadline(now, lease));
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn renew_lease(&self, job_id: Uuid, worker_id: &str, lease: Duration) -> AppResult<bool> {
        let now = self.clock.now();
        Ok(self.with_owned_job(job_id, worker_id, |job| {
            job.lease_expires_at = Some(lease_deadline(now, lease));
            job.updated_at = now;
        }))
    }

    async fn ack_success(
        &self,
        job_id: Uuid,
        worker_id: &str,
        result: Option<Value>,
    ) -> AppResult<bool> {
        let now = self.clock.now();
        Ok(self.with_owned_job(job_id, worker_id, |job| {
            job.state = JobState::Completed;
            job.result = result;
            job.last_error = None;
            job.lease_owner = None;
            job.lease_expires_at = None;
            job.updated_at = now;
        }))
    }

    async fn ack_failure(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> AppResult<bool> {
        let now = self.clock.now();
        Ok(self.with_owned_job(job_id, worker_id, |job| {
            match retry_at {
                Some(at) => {
                    job.state = JobState::Scheduled;
                    job.retry_at = Some(at);
                }
                None => job.state = JobState::Failed,
            }
            job.last_error = Some(error.to_string());
            job.lease_owner = None;
            job.lease_expires_at = None;
            job.updated_at = now;
        }))
    }

    async fn cancel(&self, queue: QueueName, target: &JobRef) -> AppResult<bool> {
        let now = self.clock.now();
        let mut jobs = self.lock();
        let found = jobs.values_mut().find(|job| {
            job.queue == queue.as_str()
                && job.state == JobState::Scheduled
                && match target {
                    JobRef::Id(id) => job.id == *id,
                    JobRef::DedupeKey(key) => job.dedupe_key.as_deref() == Some(key.as_str()),
                }
        });
        match found {
            Some(job) => {
                job.state = JobState::Cancelled;
                job.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, job_id: Uuid) -> AppResult<Option<Job>> {
        Ok(self.lock().get(&job_id).cloned())
    }

    async fn counts(&self, queue: QueueName) -> AppResult<QueueCounts> {
        let now = self.clock.now();
        let jobs = self.lock();
        let mut counts = QueueCounts::default();
        for job in jobs.values().filter(|job| job.queue == queue.as_str()) {
            match job.state {
                JobState::Scheduled if job.eligible_at() <= now => counts.waiting += 1,
                JobState::Scheduled => counts.delayed += 1,
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
                JobState::Cancelled => {}
            }
        }
        Ok(counts)
    }

    async fn prune_completed(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut jobs = self.lock();
        let initial = jobs.len();
        jobs.retain(|_, job| {
            !(matches!(job.state, JobState::Completed | JobState::Cancelled)
                && job.updated_at < before)
        });
        Ok((initial - jobs.len()) as u64)
    }
}
