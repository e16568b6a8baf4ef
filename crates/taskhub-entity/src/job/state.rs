//! Job state and priority enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a job.
///
/// Transitions are `scheduled -> active -> completed | failed | cancelled`,
/// plus `active -> scheduled` when a failed attempt is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting for its eligibility time or for a free worker.
    Scheduled,
    /// Claimed by a worker under a lease.
    Active,
    /// Handler returned successfully.
    Completed,
    /// All attempts exhausted.
    Failed,
    /// Removed before it was claimed.
    Cancelled,
}

impl JobState {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the job still holds its dedupe key.
    pub fn holds_dedupe_key(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Active)
    }

    /// Return the state as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Priority level of a job. Lower numeric value is served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    /// Served before everything else eligible at the same time.
    High,
    /// Default priority.
    Medium,
    /// Served last.
    Low,
}

impl JobPriority {
    /// Return the numeric priority stored on the job.
    pub fn value(&self) -> i32 {
        match self {
            Self::High => 1,
            Self::Medium => 5,
            Self::Low => 10,
        }
    }
}

impl Default for JobPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for JobPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}
