//! Routes claimed jobs to the handler owning their `job_type`

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use taskhub_core::error::AppError;
use taskhub_entity::job::Job;

/// Work performed for one kind of queued job.
///
/// A job can be handed out again after a lease expires, so running the same
/// job twice must leave records in the same state as running it once.
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// The `job_type` string routed here
    fn job_type(&self) -> &str;

    /// Run one attempt. `Some(value)` is persisted as the job's result.
    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError>;
}

/// How an attempt went wrong, which decides whether it is retried
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Goes straight to `failed`, remaining attempts are forfeited
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Worth another try after backoff.
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Store or delivery error; treated as transient
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    /// `false` only for [`JobExecutionError::Permanent`].
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

/// Deserialize `job.payload` as `T`.
///
/// A mismatched payload never heals on retry, so it fails permanently.
pub fn decode_payload<T: DeserializeOwned>(job: &Job) -> Result<T, JobExecutionError> {
    serde_json::from_value(job.payload.clone()).map_err(|e| {
        JobExecutionError::Permanent(format!(
            "Invalid payload for job {} ({}): {e}",
            job.id, job.job_type
        ))
    })
}

/// Handler table keyed by job type
#[derive(Debug, Default)]
pub struct JobExecutor {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `handler` under its own job type, replacing any earlier one
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type().to_string();
        tracing::info!(job_type = %job_type, "Registered job handler");
        self.handlers.insert(job_type, handler);
    }

    /// Look up the handler for `job.job_type` and run it.
    ///
    /// Unknown types fail permanently
    pub async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let handler = self.handlers.get(&job.job_type).ok_or_else(|| {
            JobExecutionError::Permanent(format!(
                "No handler registered for job type '{}'",
                job.job_type
            ))
        })?;

        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            "Executing job"
        );

        handler.execute(job).await
    }

    /// True when `job_type` has a handler
    pub fn has_handler(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }
}
