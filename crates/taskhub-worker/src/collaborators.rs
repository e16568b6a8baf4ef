//! Interfaces to the record layer and the notification-delivery layer.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use taskhub_core::result::AppResult;
use taskhub_core::traits::Clock;
use taskhub_database::repositories::{NotificationRepository, RecordRepository};
use taskhub_entity::job::{ContactInfo, ReminderTask};
use taskhub_entity::record::RecordSnapshot;

/// Queries and commands served by the record layer
#[async_trait]
pub trait RecordStore: Send + Sync + Debug {
    /// Current state of a record, or `None` if it no longer exists
    async fn get_record(&self, record_id: Uuid) -> AppResult<Option<RecordSnapshot>>;

    /// How the owner is reached, or `None` if the owner is unknown
    async fn owner_contact(&self, owner_id: Uuid) -> AppResult<Option<ContactInfo>>;

    /// Record that a reminder was delivered. Returns `false` if the record is gone.
    async fn mark_reminder_sent(&self, record_id: Uuid) -> AppResult<bool>;

    /// Delete completed records older than `days`. Returns the count removed.
    async fn purge_completed_older_than(&self, days: u32) -> AppResult<u64>;
}

/// The notification-delivery layer
#[async_trait]
pub trait ReminderDelivery: Send + Sync + Debug {
    /// Deliver a reminder and return the delivery receipt ID
    async fn deliver_reminder(&self, task: &ReminderTask) -> AppResult<Uuid>;
}

/// [`RecordStore`] on the Postgres record tables
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    repo: Arc<RecordRepository>,
    clock: Arc<dyn Clock>,
}

impl PgRecordStore {
    /// Create a store over the record repository
    pub fn new(repo: Arc<RecordRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get_record(&self, record_id: Uuid) -> AppResult<Option<RecordSnapshot>> {
        self.repo.find_snapshot(record_id).await
    }

    async fn owner_contact(&self, owner_id: Uuid) -> AppResult<Option<ContactInfo>> {
        self.repo.find_owner_contact(owner_id).await
    }

    async fn mark_reminder_sent(&self, record_id: Uuid) -> AppResult<bool> {
        self.repo
            .mark_reminder_sent(record_id, self.clock.now())
            .await
    }

    async fn purge_completed_older_than(&self, days: u32) -> AppResult<u64> {
        self.repo
            .purge_completed_older_than(days, self.clock.now())
            .await
    }
}

/// [`ReminderDelivery`] that persists an in-app notification
#[derive(Debug, Clone)]
pub struct PgReminderDelivery {
    repo: Arc<NotificationRepository>,
    clock: Arc<dyn Clock>,
}

impl PgReminderDelivery {
    /// Create a delivery over the notification repository
    pub fn new(repo: Arc<NotificationRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }
}

#[async_trait]
impl ReminderDelivery for PgReminderDelivery {
    async fn deliver_reminder(&self, task: &ReminderTask) -> AppResult<Uuid> {
        self.repo
            .create_reminder(
                task.owner_id,
                task.record_id,
                &task.title,
                task.due_at,
                self.clock.now(),
            )
            .await
    }
}
