//! Lifecycle event bridge: record events in, reminder scheduling out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing;
use uuid::Uuid;

use taskhub_core::events::RecordEvent;
use taskhub_core::result::AppResult;
use taskhub_entity::job::ReminderTask;

use crate::collaborators::RecordStore;
use crate::reminder::{ReminderScheduler, ScheduleOutcome};

/// Non-blocking handle the record layer uses to emit lifecycle events.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<RecordEvent>,
}

impl EventPublisher {
    /// Create a publisher and the receiving end consumed by the bridge.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RecordEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Hand an event to the bridge without waiting.
    ///
    /// Returns `false` if the event was dropped because the bridge is
    /// saturated or stopped.
    pub fn publish(&self, event: RecordEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    record_id = %event.record_id(),
                    kind = event.kind(),
                    "Event bridge saturated, dropping lifecycle event"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::warn!(
                    record_id = %event.record_id(),
                    kind = event.kind(),
                    "Event bridge stopped, dropping lifecycle event"
                );
                false
            }
        }
    }
}

/// Drives the reminder scheduler from record lifecycle events.
///
/// Errors never travel back to the event source: each dispatch logs and
/// swallows its own failure.
#[derive(Debug, Clone)]
pub struct LifecycleEventBridge {
    reminders: ReminderScheduler,
    records: Arc<dyn RecordStore>,
}

impl LifecycleEventBridge {
    /// Create a bridge over the reminder scheduler and the record store.
    pub fn new(reminders: ReminderScheduler, records: Arc<dyn RecordStore>) -> Self {
        Self { reminders, records }
    }

    /// Consume events until the channel closes or shutdown is signalled.
    pub async fn run(self, mut events: mpsc::Receiver<RecordEvent>, mut cancel: watch::Receiver<bool>) {
        tracing::info!("Lifecycle event bridge started");
        loop {
            tokio::select! {
                _ = cancel.changed() => break,
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => break,
                },
            }
        }
        tracing::info!("Lifecycle event bridge stopped");
    }

    /// Handle one event, logging any failure.
    pub async fn dispatch(&self, event: RecordEvent) {
        let record_id = event.record_id();
        let kind = event.kind();
        if let Err(e) = self.handle(event).await {
            tracing::error!(
                %record_id,
                kind,
                error = %e,
                unavailable = e.is_unavailable(),
                "Failed to apply lifecycle event; reminder state may be stale"
            );
        }
    }

    async fn handle(&self, event: RecordEvent) -> AppResult<()> {
        match event {
            RecordEvent::Created {
                record_id,
                owner_id,
                due_at,
            } => {
                if let Some(due_at) = due_at {
                    self.schedule(record_id, owner_id, due_at).await?;
                }
            }
            RecordEvent::Updated {
                record_id, status, ..
            } => {
                if status.is_terminal() {
                    self.reminders.cancel_reminder(record_id).await?;
                }
            }
            RecordEvent::Deleted { record_id, .. } => {
                self.reminders.cancel_reminder(record_id).await?;
            }
            RecordEvent::DueDateChanged {
                record_id,
                owner_id,
                old_due_at,
                new_due_at,
            } => {
                // Not atomic: a failure between the two steps leaves the
                // record without a reminder, never with two.
                if old_due_at.is_some() {
                    self.reminders.cancel_reminder(record_id).await?;
                }
                if let Some(due_at) = new_due_at {
                    self.schedule(record_id, owner_id, due_at).await?;
                }
            }
        }
        Ok(())
    }

    /// Resolve title and contact from the record layer, then schedule.
    async fn schedule(
        &self,
        record_id: Uuid,
        owner_id: Uuid,
        due_at: DateTime<Utc>,
    ) -> AppResult<Option<ScheduleOutcome>> {
        let Some(record) = self.records.get_record(record_id).await? else {
            tracing::warn!(%record_id, "Record vanished before its reminder was scheduled");
            return Ok(None);
        };
        let Some(contact) = self.records.owner_contact(owner_id).await? else {
            tracing::warn!(%record_id, %owner_id, "Owner unknown, reminder not scheduled");
            return Ok(None);
        };

        let task = ReminderTask {
            record_id,
            owner_id,
            title: record.title,
            due_at,
            contact,
        };
        self.reminders.schedule_reminder(task).await.map(Some)
    }
}
