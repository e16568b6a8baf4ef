//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::backoff::{BackoffKind, BackoffPolicy};
use super::state::JobState;

/// A unit of deferred work stored by the broker
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier
    pub id: Uuid,
    /// Queue name
    pub queue: String,
    /// Handler discriminator (e.g., `"send-reminder"`)
    pub job_type: String,
    /// Job-specific payload (JSON)
    pub payload: serde_json::Value,
    /// At most one scheduled or active job per queue holds a given key.
    pub dedupe_key: Option<String>,
    /// Not eligible before this instant. Set once at creation.
    pub run_at: DateTime<Utc>,
    /// Eligibility of the next attempt after a failure
    pub retry_at: Option<DateTime<Utc>>,
    /// Lower is served first
    pub priority: i32,
    /// Number of attempts started so far
    pub attempts: i32,
    /// Maximum allowed attempts
    pub max_attempts: i32,
    /// Backoff curve
    pub backoff_kind: BackoffKind,
    /// Backoff base delay in milliseconds
    pub backoff_delay_ms: i64,
    /// Current job state
    pub state: JobState,
    /// Result data on completion (JSON)
    pub result: Option<serde_json::Value>,
    /// Error message of the last failed attempt
    pub last_error: Option<String>,
    /// Worker holding the claim
    pub lease_owner: Option<String>,
    /// When the claim lapses and the job becomes reclaimable
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When the job was last updated
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// The instant from which the job may be claimed
    pub fn eligible_at(&self) -> DateTime<Utc> {
        self.retry_at.unwrap_or(self.run_at)
    }

    /// Whether a worker may claim the job at `now`.
    ///
    /// Active jobs whose lease lapsed count as claimable.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            JobState::Scheduled => self.eligible_at() <= now,
            JobState::Active => self.lease_expires_at.is_some_and(|at| at <= now),
            _ => false,
        }
    }

    /// Whether another attempt is allowed after the current one fails.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// The backoff policy stored on the job
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            kind: self.backoff_kind,
            base_delay_ms: self.backoff_delay_ms.max(0) as u64,
        }
    }
}

/// Data required to create a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    /// Queue name
    pub queue: String,
    /// Handler discriminator
    pub job_type: String,
    /// Job-specific payload
    pub payload: serde_json::Value,
    /// Optional dedupe key
    pub dedupe_key: Option<String>,
    /// Earliest execution time
    pub run_at: DateTime<Utc>,
    /// Numeric priority
    pub priority: i32,
    /// Maximum attempts
    pub max_attempts: i32,
    /// Retry backoff
    pub backoff: BackoffPolicy,
}

impl NewJob {
    /// Materialize the job row as the broker stores it
    pub fn into_job(self, id: Uuid, now: DateTime<Utc>) -> Job {
        Job {
            id,
            queue: self.queue,
            job_type: self.job_type,
            payload: self.payload,
            dedupe_key: self.dedupe_key,
            run_at: self.run_at,
            retry_at: None,
            priority: self.priority,
            attempts: 0,
            max_attempts: self.max_attempts,
            backoff_kind: self.backoff.kind,
            backoff_delay_ms: self.backoff.base_delay_ms as i64,
            state: JobState::Scheduled,
            result: None,
            last_error: None,
            lease_owner: None,
            lease_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
