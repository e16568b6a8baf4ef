//! Job repository: the SQL behind the Postgres broker.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use taskhub_core::result::AppResult;
use taskhub_entity::job::{Job, QueueCounts};

use super::db_error;

/// Repository for job storage, claims, and acknowledgements.
///
/// Every statement takes `now` from the caller so that eligibility follows
/// the injected clock rather than the database clock.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a job by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find job", e))
    }

    /// Insert a job unless a live job in the same queue holds its dedupe key.
    ///
    /// Returns `None` on a dedupe conflict.
    pub async fn insert(&self, job: &Job) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (id, queue, job_type, payload, dedupe_key, run_at, priority, \
             attempts, max_attempts, backoff_kind, backoff_delay_ms, state, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (queue, dedupe_key) \
                WHERE dedupe_key IS NOT NULL AND state IN ('scheduled', 'active') \
             DO NOTHING \
             RETURNING *",
        )
        .bind(job.id)
        .bind(&job.queue)
        .bind(&job.job_type)
        .bind(&job.payload)
        .bind(&job.dedupe_key)
        .bind(job.run_at)
        .bind(job.priority)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.backoff_kind)
        .bind(job.backoff_delay_ms)
        .bind(job.state)
        .bind(job.created_at)
        .bind(job.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create job", e))
    }

    /// Find the live (scheduled or active) job holding a dedupe key.
    pub async fn find_live_by_dedupe_key(&self, queue: &str, key: &str) -> AppResult<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM jobs WHERE queue = $1 AND dedupe_key = $2 \
             AND state IN ('scheduled', 'active') LIMIT 1",
        )
        .bind(queue)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to look up dedupe key", e))
    }

    /// Claim the next eligible job of a queue (SKIP LOCKED for concurrency).
    ///
    /// Active jobs whose lease lapsed are reclaimed in the same pass.
    pub async fn claim_next(
        &self,
        queue: &str,
        worker_id: &str,
        lease_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            "UPDATE jobs SET state = 'active', attempts = attempts + 1, lease_owner = $2, \
             lease_expires_at = $3, updated_at = $4 \
             WHERE id = ( \
                SELECT id FROM jobs \
                WHERE queue = $1 AND ( \
                    (state = 'scheduled' AND COALESCE(retry_at, run_at) <= $4) \
                    OR (state = 'active' AND lease_expires_at <= $4) \
                ) \
                ORDER BY COALESCE(retry_at, run_at) ASC, priority ASC, created_at ASC \
                LIMIT 1 \
                FOR UPDATE SKIP LOCKED \
             ) RETURNING *",
        )
        .bind(queue)
        .bind(worker_id)
        .bind(lease_expires_at)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to claim job", e))
    }

    /// Extend the lease of a job still owned by `worker_id`.
    pub async fn renew_lease(
        &self,
        job_id: Uuid,
        worker_id: &str,
        lease_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET lease_expires_at = $3, updated_at = $4 \
             WHERE id = $1 AND lease_owner = $2 AND state = 'active'",
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(lease_expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to renew lease", e))?;
        Ok(result.rows_affected() == 1)
    }

    /// Mark an owned job as completed.
    pub async fn complete(
        &self,
        job_id: Uuid,
        worker_id: &str,
        result: Option<&serde_json::Value>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let outcome = sqlx::query(
            "UPDATE jobs SET state = 'completed', result = $3, last_error = NULL, \
             lease_owner = NULL, lease_expires_at = NULL, updated_at = $4 \
             WHERE id = $1 AND lease_owner = $2 AND state = 'active'",
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(result)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to complete job", e))?;
        Ok(outcome.rows_affected() == 1)
    }

    /// Put an owned job back to `scheduled`, eligible again at `retry_at`.
    pub async fn reschedule(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error_message: &str,
        retry_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let outcome = sqlx::query(
            "UPDATE jobs SET state = 'scheduled', retry_at = $4, last_error = $3, \
             lease_owner = NULL, lease_expires_at = NULL, updated_at = $5 \
             WHERE id = $1 AND lease_owner = $2 AND state = 'active'",
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(error_message)
        .bind(retry_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to reschedule job", e))?;
        Ok(outcome.rows_affected() == 1)
    }

    /// Mark an owned job as terminally failed.
    pub async fn fail(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let outcome = sqlx::query(
            "UPDATE jobs SET state = 'failed', last_error = $3, \
             lease_owner = NULL, lease_expires_at = NULL, updated_at = $4 \
             WHERE id = $1 AND lease_owner = $2 AND state = 'active'",
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(error_message)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to mark job as failed", e))?;
        Ok(outcome.rows_affected() == 1)
    }

    /// Cancel a scheduled job by ID.
    pub async fn cancel_by_id(&self, queue: &str, job_id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        let outcome = sqlx::query(
            "UPDATE jobs SET state = 'cancelled', updated_at = $3 \
             WHERE id = $1 AND queue = $2 AND state = 'scheduled'",
        )
        .bind(job_id)
        .bind(queue)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to cancel job", e))?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Cancel the scheduled job holding a dedupe key.
    pub async fn cancel_by_dedupe_key(
        &self,
        queue: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let outcome = sqlx::query(
            "UPDATE jobs SET state = 'cancelled', updated_at = $3 \
             WHERE queue = $1 AND dedupe_key = $2 AND state = 'scheduled'",
        )
        .bind(queue)
        .bind(key)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to cancel job", e))?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Count jobs of a queue by state. Scheduled jobs split into waiting
    /// and delayed around `now`.
    pub async fn counts(&self, queue: &str, now: DateTime<Utc>) -> AppResult<QueueCounts> {
        let (waiting, delayed, active, completed, failed): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                "SELECT \
                    COUNT(*) FILTER (WHERE state = 'scheduled' AND COALESCE(retry_at, run_at) <= $2), \
                    COUNT(*) FILTER (WHERE state = 'scheduled' AND COALESCE(retry_at, run_at) > $2), \
                    COUNT(*) FILTER (WHERE state = 'active'), \
                    COUNT(*) FILTER (WHERE state = 'completed'), \
                    COUNT(*) FILTER (WHERE state = 'failed') \
                 FROM jobs WHERE queue = $1",
            )
            .bind(queue)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count jobs", e))?;

        Ok(QueueCounts {
            waiting: waiting.max(0) as u64,
            active: active.max(0) as u64,
            completed: completed.max(0) as u64,
            failed: failed.max(0) as u64,
            delayed: delayed.max(0) as u64,
        })
    }

    /// Delete completed and cancelled jobs last touched before `before`.
    ///
    /// Failed jobs are kept for manual intervention.
    pub async fn prune_finished(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM jobs WHERE state IN ('completed', 'cancelled') AND updated_at < $1",
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to prune jobs", e))?;
        Ok(result.rows_affected())
    }
}
