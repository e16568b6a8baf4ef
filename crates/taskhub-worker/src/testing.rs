//! Fakes and fixtures shared by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use taskhub_core::error::AppError;
use taskhub_core::result::AppResult;
use taskhub_core::traits::ManualClock;
use taskhub_core::types::RecordStatus;
use taskhub_entity::job::{BackoffPolicy, ContactInfo, Job, NewJob, ReminderTask};
use taskhub_entity::record::RecordSnapshot;

use crate::collaborators::{RecordStore, ReminderDelivery};

pub(crate) fn fixed_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
    ))
}

pub(crate) fn job_of_type(job_type: &str, payload: serde_json::Value) -> Job {
    let now = Utc::now();
    NewJob {
        queue: "reminder".to_string(),
        job_type: job_type.to_string(),
        payload,
        dedupe_key: None,
        run_at: now,
        priority: 5,
        max_attempts: 1,
        backoff: BackoffPolicy::fixed(std::time::Duration::ZERO),
    }
    .into_job(Uuid::new_v4(), now)
}

pub(crate) fn contact() -> ContactInfo {
    ContactInfo {
        email: "ada@example.com".to_string(),
        name: "Ada Lovelace".to_string(),
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeRecords {
    pub records: Mutex<HashMap<Uuid, RecordSnapshot>>,
    pub contacts: Mutex<HashMap<Uuid, ContactInfo>>,
    pub purged_with: Mutex<Vec<u32>>,
    pub purge_result: Mutex<Option<u64>>,
    pub unavailable: Mutex<bool>,
}

impl FakeRecords {
    pub fn insert(&self, title: &str, status: RecordStatus) -> RecordSnapshot {
        let record = RecordSnapshot {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: title.to_string(),
            status,
            due_at: None,
            reminder_sent: false,
            completed_at: None,
        };
        self.records.lock().unwrap().insert(record.id, record.clone());
        self.contacts.lock().unwrap().insert(record.owner_id, contact());
        record
    }

    pub fn get(&self, id: Uuid) -> Option<RecordSnapshot> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    fn check(&self) -> AppResult<()> {
        if *self.unavailable.lock().unwrap() {
            Err(AppError::service_unavailable("record store down"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for FakeRecords {
    async fn get_record(&self, record_id: Uuid) -> AppResult<Option<RecordSnapshot>> {
        self.check()?;
        Ok(self.get(record_id))
    }

    async fn owner_contact(&self, owner_id: Uuid) -> AppResult<Option<ContactInfo>> {
        self.check()?;
        Ok(self.contacts.lock().unwrap().get(&owner_id).cloned())
    }

    async fn mark_reminder_sent(&self, record_id: Uuid) -> AppResult<bool> {
        self.check()?;
        Ok(match self.records.lock().unwrap().get_mut(&record_id) {
            Some(record) => {
                record.reminder_sent = true;
                true
            }
            None => false,
        })
    }

    async fn purge_completed_older_than(&self, days: u32) -> AppResult<u64> {
        self.check()?;
        self.purged_with.lock().unwrap().push(days);
        Ok(self.purge_result.lock().unwrap().unwrap_or(0))
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeDelivery {
    pub delivered: Mutex<Vec<ReminderTask>>,
    pub failures_left: Mutex<u32>,
}

#[async_trait]
impl ReminderDelivery for FakeDelivery {
    async fn deliver_reminder(&self, task: &ReminderTask) -> AppResult<Uuid> {
        let mut failures = self.failures_left.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(AppError::external("mail relay refused"));
        }
        self.delivered.lock().unwrap().push(task.clone());
        Ok(Uuid::new_v4())
    }
}
