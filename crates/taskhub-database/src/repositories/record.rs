//! Record repository: the record-layer queries the handlers depend on.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use taskhub_core::result::AppResult;
use taskhub_core::types::RecordStatus;
use taskhub_entity::job::ContactInfo;
use taskhub_entity::record::RecordSnapshot;

use super::db_error;

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    status: String,
    due_at: Option<DateTime<Utc>>,
    reminder_sent: bool,
    completed_at: Option<DateTime<Utc>>,
}

impl RecordRow {
    fn into_snapshot(self) -> RecordSnapshot {
        let status = RecordStatus::parse(&self.status).unwrap_or_else(|| {
            warn!(record_id = %self.id, status = %self.status, "Unknown record status, treating as archived");
            RecordStatus::Archived
        });
        RecordSnapshot {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            status,
            due_at: self.due_at,
            reminder_sent: self.reminder_sent,
            completed_at: self.completed_at,
        }
    }
}

/// Repository over the `records` and `record_owners` tables.
#[derive(Debug, Clone)]
pub struct RecordRepository {
    pool: PgPool,
}

impl RecordRepository {
    /// Create a new record repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the current state of a record.
    pub async fn find_snapshot(&self, id: Uuid) -> AppResult<Option<RecordSnapshot>> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT id, owner_id, title, status, due_at, reminder_sent, completed_at \
             FROM records WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find record", e))?;
        Ok(row.map(RecordRow::into_snapshot))
    }

    /// Fetch how the owner of a record is reached.
    pub async fn find_owner_contact(&self, owner_id: Uuid) -> AppResult<Option<ContactInfo>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT email, display_name FROM record_owners WHERE id = $1")
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to find record owner", e))?;
        Ok(row.map(|(email, name)| ContactInfo { email, name }))
    }

    /// Flag a record as reminded. Returns `false` if the record is gone.
    pub async fn mark_reminder_sent(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE records SET reminder_sent = TRUE, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to mark reminder sent", e))?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete completed records whose completion is older than `days`.
    pub async fn purge_completed_older_than(&self, days: u32, now: DateTime<Utc>) -> AppResult<u64> {
        let cutoff = now - chrono::Duration::days(i64::from(days));
        let result = sqlx::query(
            "DELETE FROM records WHERE status = 'completed' AND completed_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to purge completed records", e))?;
        Ok(result.rows_affected())
    }
}
