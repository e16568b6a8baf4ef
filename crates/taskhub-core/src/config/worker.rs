//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker pools are started in this process.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay between claim attempts when a queue has no eligible job.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Concurrent jobs on the reminder queue.
    #[serde(default = "default_reminder_concurrency")]
    pub reminder_concurrency: usize,
    /// Concurrent jobs on the cleanup queue.
    #[serde(default = "default_cleanup_concurrency")]
    pub cleanup_concurrency: usize,
    /// Upper bound for a single retry delay.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_seconds: u64,
    /// How long shutdown waits for in-flight jobs.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            poll_interval_ms: default_poll_interval(),
            reminder_concurrency: default_reminder_concurrency(),
            cleanup_concurrency: default_cleanup_concurrency(),
            max_backoff_seconds: default_max_backoff(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    500
}

fn default_reminder_concurrency() -> usize {
    4
}

fn default_cleanup_concurrency() -> usize {
    1
}

fn default_max_backoff() -> u64 {
    3600
}

fn default_shutdown_timeout() -> u64 {
    30
}
