//! Queue names and job type discriminators.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical queues served by the worker pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueName {
    /// Due-date reminders
    Reminder,
    /// Periodic purge of stale records
    Cleanup,
}

impl QueueName {
    /// Every queue, in the order they are reported
    pub const ALL: [QueueName; 2] = [QueueName::Reminder, QueueName::Cleanup];

    /// Return the name stored in the job table
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job type discriminators that select a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    /// Deliver a due-date reminder
    #[serde(rename = "send-reminder")]
    SendReminder,
    /// Purge completed records past retention
    #[serde(rename = "purge-completed")]
    PurgeCompleted,
}

impl JobType {
    /// Return the discriminator stored on the job
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendReminder => "send-reminder",
            Self::PurgeCompleted => "purge-completed",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
