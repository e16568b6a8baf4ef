//! Notification repository: persisted reminder deliveries.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use taskhub_core::result::AppResult;

use super::db_error;

/// Notification kind stored for due-date reminders.
pub const REMINDER_KIND: &str = "todo_reminder";

/// Title of every due-date reminder.
pub const REMINDER_TITLE: &str = "Todo Reminder";

/// Build the reminder message body.
pub fn reminder_message(title: &str, due_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = ((due_at - now).num_seconds() as f64 / 3600.0).round() as i64;
    format!("Your todo \"{title}\" is due in {hours} hours")
}

/// Repository for the `notifications` table.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a due-date reminder for an owner and return its ID as the
    /// delivery receipt.
    pub async fn create_reminder(
        &self,
        owner_id: Uuid,
        record_id: Uuid,
        title: &str,
        due_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Uuid> {
        let id = Uuid::now_v7();
        let data = serde_json::json!({ "recordId": record_id, "dueAt": due_at });
        sqlx::query(
            "INSERT INTO notifications (id, owner_id, record_id, kind, title, message, data, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(owner_id)
        .bind(record_id)
        .bind(REMINDER_KIND)
        .bind(REMINDER_TITLE)
        .bind(reminder_message(title, due_at, now))
        .bind(&data)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create notification", e))?;
        Ok(id)
    }
}
