//! Record lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::RecordStatus;

/// Lifecycle events emitted by the record layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RecordEvent {
    /// A record was created
    #[serde(rename_all = "camelCase")]
    Created {
        /// The record ID
        record_id: Uuid,
        /// The owner of the record
        owner_id: Uuid,
        /// Due date, if one was set at creation
        #[serde(default)]
        due_at: Option<DateTime<Utc>>,
    },
    /// A record was updated
    #[serde(rename_all = "camelCase")]
    Updated {
        /// The record ID
        record_id: Uuid,
        /// The owner of the record
        owner_id: Uuid,
        /// Status after the update
        status: RecordStatus,
    },
    /// A record was deleted
    #[serde(rename_all = "camelCase")]
    Deleted {
        /// The record ID
        record_id: Uuid,
        /// The owner of the record
        owner_id: Uuid,
    },
    /// The due date of a record changed
    #[serde(rename_all = "camelCase")]
    DueDateChanged {
        /// The record ID
        record_id: Uuid,
        /// The owner of the record
        owner_id: Uuid,
        /// Previous due date
        #[serde(default)]
        old_due_at: Option<DateTime<Utc>>,
        /// New due date
        #[serde(default)]
        new_due_at: Option<DateTime<Utc>>,
    },
}

impl RecordEvent {
    /// The record this event refers to
    pub fn record_id(&self) -> Uuid {
        match self {
            Self::Created { record_id, .. }
            | Self::Updated { record_id, .. }
            | Self::Deleted { record_id, .. }
            | Self::DueDateChanged { record_id, .. } => *record_id,
        }
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Deleted { .. } => "deleted",
            Self::DueDateChanged { .. } => "dueDateChanged",
        }
    }
}
