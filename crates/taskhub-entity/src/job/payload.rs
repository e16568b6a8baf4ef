//! Typed job payload definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the owner of a record is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    /// Delivery address.
    pub email: String,
    /// Display name used in the message.
    pub name: String,
}

/// Payload of a `send-reminder` job.
///
/// A snapshot taken at scheduling time. Only the message content is taken
/// from it; the handler re-reads the record before acting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderTask {
    /// Reminded record.
    pub record_id: Uuid,
    /// Owner to notify.
    pub owner_id: Uuid,
    /// Record title at scheduling time.
    pub title: String,
    /// Due date at scheduling time.
    pub due_at: DateTime<Utc>,
    /// Owner contact at scheduling time.
    pub contact: ContactInfo,
}

/// Payload of a `purge-completed` job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupTask {
    /// Completed records older than this many days are purged.
    pub older_than_days: u32,
}
