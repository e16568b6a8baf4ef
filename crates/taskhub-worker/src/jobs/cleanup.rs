//! `purge-completed` handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing;

use taskhub_entity::job::{CleanupTask, Job, JobType};

use crate::collaborators::RecordStore;
use crate::executor::{JobExecutionError, JobHandler, decode_payload};

/// Bulk-deletes completed records past retention.
#[derive(Debug)]
pub struct CleanupJobHandler {
    records: Arc<dyn RecordStore>,
}

impl CleanupJobHandler {
    /// Create a new cleanup handler.
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl JobHandler for CleanupJobHandler {
    fn job_type(&self) -> &str {
        JobType::PurgeCompleted.as_str()
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let task: CleanupTask = decode_payload(job)?;
        tracing::info!(older_than_days = task.older_than_days, "Purging completed records");

        let deleted = self
            .records
            .purge_completed_older_than(task.older_than_days)
            .await?;

        tracing::info!(deleted, "Purged completed records");
        Ok(Some(serde_json::json!({ "deleted": deleted })))
    }
}
