//! Per-queue job counts.

use serde::{Deserialize, Serialize};

/// Snapshot of job counts for one queue.
///
/// `waiting` and `delayed` split scheduled jobs by whether their eligibility
/// time has passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    /// Eligible, not yet claimed.
    pub waiting: u64,
    /// Claimed by a worker.
    pub active: u64,
    /// Finished successfully and not yet pruned.
    pub completed: u64,
    /// Exhausted all attempts.
    pub failed: u64,
    /// Scheduled for a future instant.
    pub delayed: u64,
}
