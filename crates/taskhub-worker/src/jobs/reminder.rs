//! `send-reminder` handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing;

use taskhub_entity::job::{Job, JobType, ReminderTask};

use crate::collaborators::{RecordStore, ReminderDelivery};
use crate::executor::{JobExecutionError, JobHandler, decode_payload};

/// Delivers a due-date reminder after re-validating the record.
///
/// The payload only supplies message content. Whether to deliver is decided
/// from the record's current state, so redelivered jobs are no-ops once the
/// record is marked as reminded.
#[derive(Debug)]
pub struct ReminderJobHandler {
    records: Arc<dyn RecordStore>,
    delivery: Arc<dyn ReminderDelivery>,
}

impl ReminderJobHandler {
    /// Create a new reminder handler.
    pub fn new(records: Arc<dyn RecordStore>, delivery: Arc<dyn ReminderDelivery>) -> Self {
        Self { records, delivery }
    }
}

#[async_trait]
impl JobHandler for ReminderJobHandler {
    fn job_type(&self) -> &str {
        JobType::SendReminder.as_str()
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let task: ReminderTask = decode_payload(job)?;
        let record_id = task.record_id;

        let Some(record) = self.records.get_record(record_id).await? else {
            tracing::warn!(%record_id, "Record not found, skipping reminder");
            return Ok(Some(json!({ "status": "skipped", "reason": "not_found" })));
        };
        if !record.awaits_reminder() {
            let reason = if record.status.is_terminal() { "closed" } else { "already_sent" };
            tracing::info!(%record_id, status = %record.status, reason, "Skipping reminder");
            return Ok(Some(json!({ "status": "skipped", "reason": reason })));
        }

        let receipt = self.delivery.deliver_reminder(&task).await?;
        if !self.records.mark_reminder_sent(record_id).await? {
            tracing::warn!(%record_id, "Record removed while its reminder was delivered");
        }

        tracing::info!(%record_id, %receipt, "Reminder sent");
        Ok(Some(json!({ "status": "sent", "receiptId": receipt })))
    }
}
