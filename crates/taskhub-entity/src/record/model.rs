//! Record snapshot returned by the record layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use taskhub_core::types::RecordStatus;

/// Current state of a reminded record, as answered by the record layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    /// Record ID
    pub id: Uuid,
    /// Owner of the record
    pub owner_id: Uuid,
    /// Title shown in the reminder
    pub title: String,
    /// Workflow status
    pub status: RecordStatus,
    /// Due date, if any
    pub due_at: Option<DateTime<Utc>>,
    /// Whether a reminder was already delivered for this record
    pub reminder_sent: bool,
    /// When the record reached `completed`
    pub completed_at: Option<DateTime<Utc>>,
}

impl RecordSnapshot {
    /// Whether a reminder for this record may still be delivered
    pub fn awaits_reminder(&self) -> bool {
        !self.status.is_terminal() && !self.reminder_sent
    }
}
