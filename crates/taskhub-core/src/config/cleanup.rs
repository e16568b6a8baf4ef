//! Cleanup trigger configuration.

use serde::{Deserialize, Serialize};

/// Recurring purge trigger. Cron expressions are evaluated in UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Six-field cron expression (seconds first).
    #[serde(default = "default_cron")]
    pub cron: String,
    /// Completed records older than this are purged.
    #[serde(default = "default_older_than_days")]
    pub older_than_days: u32,
    /// Enqueue one purge job when the scheduler starts.
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            older_than_days: default_older_than_days(),
            run_on_startup: default_true(),
        }
    }
}

fn default_cron() -> String {
    "0 0 2 * * *".to_string()
}

fn default_older_than_days() -> u32 {
    30
}

fn default_true() -> bool {
    true
}
