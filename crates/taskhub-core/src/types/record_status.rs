//! Status of a record owned by the external record layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow status of a reminded record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Not started yet
    Pending,
    /// Work in progress
    InProgress,
    /// Done
    Completed,
    /// Hidden from active lists
    Archived,
}

impl RecordStatus {
    /// Whether no reminder should be sent for a record in this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Archived)
    }

    /// Return the status as the lowercase string stored by the record layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    /// Parse the stored string form. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
