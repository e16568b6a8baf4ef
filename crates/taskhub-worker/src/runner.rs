//! Worker pool: the loop that claims due jobs and executes them.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{Semaphore, watch};
use tokio::time;
use uuid::Uuid;

use chrono::{DateTime, Utc};
use taskhub_core::config::{BrokerConfig, WorkerConfig};
use taskhub_core::result::AppResult;
use taskhub_core::traits::Clock;
use taskhub_entity::job::{Job, QueueName};

use crate::broker::JobBroker;
use crate::executor::{JobExecutionError, JobExecutor};

/// Tuning of one worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Maximum jobs executed at once.
    pub concurrency: usize,
    /// Sleep between polls when no job is eligible.
    pub poll_interval: Duration,
    /// Claim lease; renewed at half this interval while a job runs.
    pub lease: Duration,
    /// Upper bound on any retry delay.
    pub max_backoff: Duration,
    /// How long shutdown waits for in-flight jobs.
    pub shutdown_timeout: Duration,
}

impl WorkerPoolConfig {
    /// Build the pool settings for `queue` from the config sections.
    pub fn for_queue(queue: QueueName, worker: &WorkerConfig, broker: &BrokerConfig) -> Self {
        let concurrency = match queue {
            QueueName::Reminder => worker.reminder_concurrency,
            QueueName::Cleanup => worker.cleanup_concurrency,
        };
        Self {
            concurrency: concurrency.max(1),
            poll_interval: Duration::from_millis(worker.poll_interval_ms.max(10)),
            lease: Duration::from_secs(broker.lease_seconds.max(1)),
            max_backoff: Duration::from_secs(worker.max_backoff_seconds),
            shutdown_timeout: Duration::from_secs(worker.shutdown_timeout_seconds),
        }
    }
}

/// What happened to a claimed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The handler succeeded.
    Completed {
        /// Job ID.
        job_id: Uuid,
    },
    /// The attempt failed and another one is scheduled.
    Retrying {
        /// Job ID.
        job_id: Uuid,
        /// When the next attempt becomes eligible.
        retry_at: DateTime<Utc>,
    },
    /// The job failed for good.
    Failed {
        /// Job ID.
        job_id: Uuid,
    },
    /// The lease was lost before the ack; another worker owns the job.
    LeaseLost {
        /// Job ID.
        job_id: Uuid,
    },
}

/// A fixed-size pool of workers serving one queue.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    queue: QueueName,
    broker: Arc<dyn JobBroker>,
    executor: Arc<JobExecutor>,
    clock: Arc<dyn Clock>,
    config: WorkerPoolConfig,
    worker_id: String,
}

impl WorkerPool {
    /// Create a pool for `queue`.
    pub fn new(
        queue: QueueName,
        broker: Arc<dyn JobBroker>,
        executor: Arc<JobExecutor>,
        clock: Arc<dyn Clock>,
        config: WorkerPoolConfig,
        worker_id: String,
    ) -> Self {
        Self {
            queue,
            broker,
            executor,
            clock,
            config,
            worker_id,
        }
    }

    /// Serve the queue until the cancel signal is received.
    pub async fn run(self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            worker_id = %self.worker_id,
            queue = %self.queue,
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        loop {
            if *cancel.borrow() {
                break;
            }
            // Never raced against shutdown: a claim is committed by the
            // broker before it returns, so the claimed job must be run.
            if self.poll_and_spawn(&semaphore).await {
                continue;
            }
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = time::sleep(self.config.poll_interval) => {}
            }
        }

        tracing::info!(
            worker_id = %self.worker_id,
            queue = %self.queue,
            "Worker pool waiting for in-flight jobs"
        );

        let permits = u32::try_from(self.config.concurrency).unwrap_or(u32::MAX);
        if time::timeout(self.config.shutdown_timeout, semaphore.acquire_many(permits))
            .await
            .is_err()
        {
            tracing::warn!(
                queue = %self.queue,
                "Shutdown timeout elapsed with jobs still running; their leases will expire"
            );
        }

        tracing::info!(worker_id = %self.worker_id, queue = %self.queue, "Worker pool stopped");
    }

    /// Claim one job if a slot is free and run it on its own task.
    ///
    /// Returns whether a job was claimed.
    async fn poll_and_spawn(&self, semaphore: &Arc<Semaphore>) -> bool {
        let Ok(permit) = semaphore.clone().try_acquire_owned() else {
            tracing::trace!(queue = %self.queue, "All worker slots occupied");
            return false;
        };

        match self
            .broker
            .claim_next(self.queue, &self.worker_id, self.config.lease)
            .await
        {
            Ok(Some(job)) => {
                let pool = self.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    let job_id = job.id;
                    if let Err(e) = pool.execute(job).await {
                        tracing::error!(%job_id, error = %e, "Failed to acknowledge job");
                    }
                });
                true
            }
            Ok(None) => {
                tracing::trace!(queue = %self.queue, "No eligible jobs");
                false
            }
            Err(e) => {
                tracing::error!(queue = %self.queue, error = %e, "Failed to claim job");
                false
            }
        }
    }

    /// Claim and execute one job inline.
    ///
    /// Returns `None` when no job is eligible.
    pub async fn process_next(&self) -> AppResult<Option<ProcessOutcome>> {
        match self
            .broker
            .claim_next(self.queue, &self.worker_id, self.config.lease)
            .await?
        {
            Some(job) => self.execute(job).await.map(Some),
            None => Ok(None),
        }
    }

    /// Run the handler for a claimed job and acknowledge the result.
    async fn execute(&self, job: Job) -> AppResult<ProcessOutcome> {
        let job_id = job.id;

        // A lease that lapsed during the final attempt hands the job back
        // with attempts already spent.
        if job.attempts > job.max_attempts {
            let message = format!(
                "Lease expired during final attempt ({}/{})",
                job.max_attempts, job.max_attempts
            );
            tracing::error!(%job_id, queue = %self.queue, "{message}");
            return self.ack_failure(&job, &message, None).await;
        }

        let heartbeat = self.spawn_heartbeat(job_id);
        let outcome = AssertUnwindSafe(self.executor.execute(&job))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(JobExecutionError::Transient(format!(
                    "Handler panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });
        heartbeat.abort();

        match outcome {
            Ok(result) => {
                if self
                    .broker
                    .ack_success(job_id, &self.worker_id, result)
                    .await?
                {
                    tracing::info!(%job_id, queue = %self.queue, "Job completed");
                    Ok(ProcessOutcome::Completed { job_id })
                } else {
                    tracing::warn!(%job_id, "Lease lost before completion ack");
                    Ok(ProcessOutcome::LeaseLost { job_id })
                }
            }
            Err(err) if err.is_retryable() && job.can_retry() => {
                let attempts = u32::try_from(job.attempts).unwrap_or(1);
                let delay = job.backoff().delay_for(attempts, self.config.max_backoff);
                let retry_at = self.clock.now()
                    + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
                tracing::warn!(
                    %job_id,
                    queue = %self.queue,
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Job failed, scheduling retry"
                );
                self.ack_failure(&job, &err.to_string(), Some(retry_at)).await
            }
            Err(err) => {
                tracing::error!(
                    %job_id,
                    queue = %self.queue,
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    error = %err,
                    "Job failed permanently"
                );
                self.ack_failure(&job, &err.to_string(), None).await
            }
        }
    }

    async fn ack_failure(
        &self,
        job: &Job,
        message: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> AppResult<ProcessOutcome> {
        let job_id = job.id;
        let owned = self
            .broker
            .ack_failure(job_id, &self.worker_id, message, retry_at)
            .await?;
        Ok(match (owned, retry_at) {
            (false, _) => {
                tracing::warn!(%job_id, "Lease lost before failure ack");
                ProcessOutcome::LeaseLost { job_id }
            }
            (true, Some(retry_at)) => ProcessOutcome::Retrying { job_id, retry_at },
            (true, None) => ProcessOutcome::Failed { job_id },
        })
    }

    /// Renew the lease at half its length until aborted.
    fn spawn_heartbeat(&self, job_id: Uuid) -> tokio::task::JoinHandle<()> {
        let broker = Arc::clone(&self.broker);
        let worker_id = self.worker_id.clone();
        let lease = self.config.lease;
        let period = (lease / 2).max(Duration::from_millis(100));
        tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                match broker.renew_lease(job_id, &worker_id, lease).await {
                    Ok(true) => tracing::trace!(%job_id, "Lease renewed"),
                    Ok(false) => {
                        tracing::warn!(%job_id, "Lease no longer owned, stopping heartbeat");
                        break;
                    }
                    Err(e) => tracing::warn!(%job_id, error = %e, "Failed to renew lease"),
                }
            }
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Periodically drops completed and cancelled jobs past retention.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    broker: Arc<dyn JobBroker>,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
    interval: Duration,
}

impl RetentionSweeper {
    /// Create a sweeper from the `broker` config section.
    pub fn new(broker: Arc<dyn JobBroker>, clock: Arc<dyn Clock>, config: &BrokerConfig) -> Self {
        Self {
            broker,
            clock,
            retention: chrono::Duration::hours(config.completed_retention_hours.max(0)),
            interval: Duration::from_secs(config.retention_sweep_seconds.max(1)),
        }
    }

    /// Prune once and return how many jobs were removed.
    pub async fn sweep_once(&self) -> AppResult<u64> {
        let before = self.clock.now() - self.retention;
        let pruned = self.broker.prune_completed(before).await?;
        if pruned > 0 {
            tracing::info!(pruned, %before, "Pruned finished jobs");
        }
        Ok(pruned)
    }

    /// Sweep on a fixed interval until cancelled.
    pub async fn run(self, mut cancel: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.changed() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::warn!(error = %e, "Retention sweep failed");
                    }
                }
            }
        }
        tracing::debug!("Retention sweeper stopped");
    }
}
