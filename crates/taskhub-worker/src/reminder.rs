//! Reminder scheduling: when to fire, and the idempotent key per record.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing;
use uuid::Uuid;

use taskhub_core::result::AppResult;
use taskhub_entity::job::{BackoffPolicy, JobPriority, JobType, ReminderTask};

use crate::queue::{EnqueueOptions, QueueClient, QueueError};

/// Reminders fire this long before the due date.
pub const REMINDER_LEAD: chrono::Duration = chrono::Duration::hours(24);

/// Attempts allowed for a reminder delivery.
pub const REMINDER_MAX_ATTEMPTS: u32 = 3;

/// Base delay of the exponential reminder backoff.
pub const REMINDER_BACKOFF_BASE: Duration = Duration::from_secs(5);

/// Dedupe key of the reminder job for a record.
pub fn dedupe_key(record_id: Uuid) -> String {
    format!("reminder:{record_id}")
}

/// Result of [`ReminderScheduler::schedule_reminder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A new reminder job was enqueued.
    Scheduled {
        /// The reminder job.
        job_id: Uuid,
        /// When it becomes eligible.
        notify_at: DateTime<Utc>,
    },
    /// A reminder for the record is already pending.
    AlreadyScheduled {
        /// The pending job.
        existing: Uuid,
    },
    /// The due date is within the lead window; nothing was enqueued.
    Skipped {
        /// The instant the reminder would have fired.
        notify_at: DateTime<Utc>,
    },
}

/// Schedules and cancels due-date reminders on the `reminder` queue.
#[derive(Debug, Clone)]
pub struct ReminderScheduler {
    queue: QueueClient,
}

impl ReminderScheduler {
    /// Create a scheduler on the reminder queue client.
    pub fn new(queue: QueueClient) -> Self {
        Self { queue }
    }

    /// Schedule a reminder 24 hours before `task.due_at`.
    ///
    /// Records due within the next 24 hours, or already past due, get no
    /// reminder. Scheduling twice for the same record is a no-op.
    pub async fn schedule_reminder(&self, task: ReminderTask) -> AppResult<ScheduleOutcome> {
        let now = self.queue.now();
        let notify_at = task.due_at - REMINDER_LEAD;
        let record_id = task.record_id;

        if notify_at <= now {
            tracing::info!(
                %record_id,
                due_at = %task.due_at,
                "Due date within 24 hours, reminder not scheduled"
            );
            return Ok(ScheduleOutcome::Skipped { notify_at });
        }

        let options = EnqueueOptions {
            run_at: Some(notify_at),
            priority: JobPriority::High,
            dedupe_key: Some(dedupe_key(record_id)),
            max_attempts: REMINDER_MAX_ATTEMPTS,
            backoff: BackoffPolicy::exponential(REMINDER_BACKOFF_BASE),
            ..EnqueueOptions::default()
        };

        match self.queue.enqueue(JobType::SendReminder, &task, options).await {
            Ok(job_id) => {
                tracing::info!(%record_id, %job_id, %notify_at, "Reminder scheduled");
                Ok(ScheduleOutcome::Scheduled { job_id, notify_at })
            }
            Err(QueueError::DuplicateJob { existing, .. }) => {
                tracing::debug!(%record_id, %existing, "Reminder already scheduled");
                Ok(ScheduleOutcome::AlreadyScheduled { existing })
            }
            Err(QueueError::Broker(e)) => Err(e),
        }
    }

    /// Cancel the pending reminder of a record.
    ///
    /// Returns `false` if there was none, which covers records that never
    /// had a due date and reminders that already fired.
    pub async fn cancel_reminder(&self, record_id: Uuid) -> AppResult<bool> {
        let removed = self.queue.cancel(&dedupe_key(record_id)).await?;
        if removed {
            tracing::info!(%record_id, "Reminder cancelled");
        } else {
            tracing::debug!(%record_id, "No pending reminder to cancel");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use taskhub_core::traits::{Clock, ManualClock};
    use taskhub_entity::job::{BackoffKind, JobState, QueueName};

    use crate::broker::InMemoryBroker;
    use crate::testing::{contact, fixed_clock};

    fn setup() -> (Arc<ManualClock>, Arc<InMemoryBroker>, ReminderScheduler) {
        let clock = fixed_clock();
        let broker = Arc::new(InMemoryBroker::new(clock.clone()));
        let queue = QueueClient::new(QueueName::Reminder, broker.clone(), clock.clone());
        (clock, broker, ReminderScheduler::new(queue))
    }

    fn task(record_id: Uuid, due_at: DateTime<Utc>) -> ReminderTask {
        ReminderTask {
            record_id,
            owner_id: Uuid::new_v4(),
            title: "File taxes".to_string(),
            due_at,
            contact: contact(),
        }
    }

    #[tokio::test]
    async fn test_schedules_one_job_a_day_before_due() {
        let (clock, broker, scheduler) = setup();
        let record_id = Uuid::new_v4();
        let due_at = clock.now() + chrono::Duration::hours(48);

        let outcome = scheduler.schedule_reminder(task(record_id, due_at)).await.unwrap();
        let ScheduleOutcome::Scheduled { job_id, notify_at } = outcome else {
            panic!("expected a scheduled reminder, got {outcome:?}");
        };
        assert_eq!(notify_at, due_at - chrono::Duration::hours(24));

        let jobs = broker.jobs_in(QueueName::Reminder);
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.id, job_id);
        assert_eq!(job.run_at, notify_at);
        assert_eq!(job.dedupe_key.as_deref(), Some(dedupe_key(record_id).as_str()));
        assert_eq!(job.priority, JobPriority::High.value());
        assert_eq!(job.max_attempts, 3);
        assert_eq!(job.backoff_kind, BackoffKind::Exponential);
        assert_eq!(job.backoff_delay_ms, 5_000);
        assert_eq!(job.job_type, "send-reminder");
    }

    /// Moves forward a few microseconds on every read, like a wall clock.
    #[derive(Debug)]
    struct TickingClock(std::sync::Mutex<DateTime<Utc>>);

    impl Clock for TickingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut now = self.0.lock().unwrap();
            *now += chrono::Duration::microseconds(7);
            *now
        }
    }

    #[tokio::test]
    async fn test_fire_time_is_exact_under_a_moving_clock() {
        let clock = Arc::new(TickingClock(std::sync::Mutex::new(fixed_clock().now())));
        let broker = Arc::new(InMemoryBroker::new(clock.clone()));
        let queue = QueueClient::new(QueueName::Reminder, broker.clone(), clock.clone());
        let scheduler = ReminderScheduler::new(queue);
        let due_at = clock.now() + chrono::Duration::hours(48);

        scheduler
            .schedule_reminder(task(Uuid::new_v4(), due_at))
            .await
            .unwrap();

        let jobs = broker.jobs_in(QueueName::Reminder);
        assert_eq!(jobs[0].run_at, due_at - chrono::Duration::hours(24));
    }

    #[tokio::test]
    async fn test_skips_due_dates_inside_lead_window() {
        let (clock, broker, scheduler) = setup();
        for offset in [
            chrono::Duration::hours(24),
            chrono::Duration::hours(3),
            chrono::Duration::hours(-5),
        ] {
            let outcome = scheduler
                .schedule_reminder(task(Uuid::new_v4(), clock.now() + offset))
                .await
                .unwrap();
            assert!(matches!(outcome, ScheduleOutcome::Skipped { .. }));
        }
        assert!(broker.jobs_in(QueueName::Reminder).is_empty());
    }

    #[tokio::test]
    async fn test_second_schedule_is_idempotent() {
        let (clock, broker, scheduler) = setup();
        let record_id = Uuid::new_v4();
        let due_at = clock.now() + chrono::Duration::days(3);

        let first = scheduler.schedule_reminder(task(record_id, due_at)).await.unwrap();
        let second = scheduler.schedule_reminder(task(record_id, due_at)).await.unwrap();
        let ScheduleOutcome::Scheduled { job_id, .. } = first else {
            panic!("expected a scheduled reminder");
        };
        assert_eq!(second, ScheduleOutcome::AlreadyScheduled { existing: job_id });
        assert_eq!(broker.jobs_in(QueueName::Reminder).len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_then_reschedule() {
        let (clock, broker, scheduler) = setup();
        let record_id = Uuid::new_v4();
        scheduler
            .schedule_reminder(task(record_id, clock.now() + chrono::Duration::days(2)))
            .await
            .unwrap();

        assert!(scheduler.cancel_reminder(record_id).await.unwrap());
        assert!(!scheduler.cancel_reminder(record_id).await.unwrap());

        clock.advance(chrono::Duration::minutes(1));
        let outcome = scheduler
            .schedule_reminder(task(record_id, clock.now() + chrono::Duration::days(5)))
            .await
            .unwrap();
        assert!(matches!(outcome, ScheduleOutcome::Scheduled { .. }));

        let states: Vec<JobState> = broker
            .jobs_in(QueueName::Reminder)
            .iter()
            .map(|job| job.state)
            .collect();
        assert_eq!(states, vec![JobState::Cancelled, JobState::Scheduled]);
    }

    #[tokio::test]
    async fn test_cancel_without_reminder_is_noop() {
        let (_clock, _broker, scheduler) = setup();
        assert!(!scheduler.cancel_reminder(Uuid::new_v4()).await.unwrap());
    }
}
