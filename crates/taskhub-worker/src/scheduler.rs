//! Cron scheduler enqueuing the periodic purge of completed records.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;
use uuid::Uuid;

use taskhub_core::config::CleanupConfig;
use taskhub_core::error::{AppError, ErrorKind};
use taskhub_core::result::AppResult;
use taskhub_entity::job::{BackoffPolicy, CleanupTask, JobPriority, JobType};

use crate::queue::{EnqueueOptions, QueueClient};

/// Attempts allowed for a purge job.
pub const CLEANUP_MAX_ATTEMPTS: u32 = 2;

/// Fixed delay between purge attempts.
pub const CLEANUP_BACKOFF: Duration = Duration::from_secs(5);

/// Returned by a manual trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerReceipt {
    /// The enqueued purge job.
    pub job_id: Uuid,
    /// When it was enqueued.
    pub scheduled_at: DateTime<Utc>,
}

/// Daily purge trigger on the `cleanup` queue.
///
/// Constructed once at startup and shared by reference. Fires on the
/// configured cron expression in UTC, once at startup, and on demand.
pub struct CleanupScheduler {
    scheduler: JobScheduler,
    queue: QueueClient,
    config: CleanupConfig,
    cron_job: Mutex<Option<Uuid>>,
}

impl std::fmt::Debug for CleanupScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupScheduler")
            .field("cron", &self.config.cron)
            .field("older_than_days", &self.config.older_than_days)
            .finish()
    }
}

impl CleanupScheduler {
    /// Create a scheduler enqueuing onto the cleanup queue client.
    pub async fn new(queue: QueueClient, config: CleanupConfig) -> AppResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self {
            scheduler,
            queue,
            config,
            cron_job: Mutex::new(None),
        })
    }

    /// Register the cron trigger, start the timer, and run the startup purge.
    pub async fn start(&self) -> AppResult<()> {
        let queue = self.queue.clone();
        let older_than_days = self.config.older_than_days;
        let job = CronJob::new_async_tz(self.config.cron.as_str(), Utc, move |_uuid, _lock| {
            let queue = queue.clone();
            Box::pin(async move {
                tracing::debug!("Scheduling purge of completed records");
                if let Err(e) = enqueue_purge(&queue, older_than_days).await {
                    tracing::error!(error = %e, "Failed to enqueue scheduled cleanup");
                }
            })
        })
        .map_err(|e| {
            AppError::new(
                ErrorKind::Configuration,
                format!("Invalid cleanup cron '{}': {e}", self.config.cron),
            )
        })?;

        let job_id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add cleanup schedule: {e}")))?;
        *self.cron_job.lock().unwrap_or_else(|e| e.into_inner()) = Some(job_id);

        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        tracing::info!(cron = %self.config.cron, "Registered: cleanup (UTC)");

        if self.config.run_on_startup {
            match enqueue_purge(&self.queue, older_than_days).await {
                Ok(job_id) => tracing::info!(%job_id, "Startup cleanup enqueued"),
                Err(e) => tracing::error!(error = %e, "Failed to enqueue startup cleanup"),
            }
        }
        Ok(())
    }

    /// Enqueue a purge now, outside the schedule.
    pub async fn trigger_now(&self) -> AppResult<TriggerReceipt> {
        let job_id = enqueue_purge(&self.queue, self.config.older_than_days).await?;
        let scheduled_at = self.queue.now();
        tracing::info!(%job_id, "Manual cleanup triggered");
        Ok(TriggerReceipt {
            job_id,
            scheduled_at,
        })
    }

    /// Next time the cron trigger fires, if registered.
    pub async fn next_fire(&self) -> AppResult<Option<DateTime<Utc>>> {
        let Some(job_id) = *self.cron_job.lock().unwrap_or_else(|e| e.into_inner()) else {
            return Ok(None);
        };
        let mut scheduler = self.scheduler.clone();
        scheduler
            .next_tick_for_job(job_id)
            .await
            .map_err(|e| AppError::internal(format!("Failed to read next cleanup tick: {e}")))
    }

    /// Stop the cron timer.
    pub async fn shutdown(&self) -> AppResult<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        tracing::info!("Cleanup scheduler shut down");
        Ok(())
    }
}

/// Enqueue one purge job. No dedupe key: overlapping purges are harmless.
async fn enqueue_purge(queue: &QueueClient, older_than_days: u32) -> AppResult<Uuid> {
    let options = EnqueueOptions {
        priority: JobPriority::Low,
        max_attempts: CLEANUP_MAX_ATTEMPTS,
        backoff: BackoffPolicy::fixed(CLEANUP_BACKOFF),
        ..EnqueueOptions::default()
    };
    let job_id = queue
        .enqueue(
            JobType::PurgeCompleted,
            &CleanupTask { older_than_days },
            options,
        )
        .await?;
    Ok(job_id)
}
