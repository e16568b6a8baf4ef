//! Shared test helpers for integration tests.
//!
//! The app runs on the in-memory broker and a manual clock, so scheduling
//! and retry timing are driven by the test instead of the wall clock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use chrono::{DateTime, TimeZone, Utc};
use http::{Request, StatusCode};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use taskhub_api::{AppState, build_router};
use taskhub_core::config::CleanupConfig;
use taskhub_core::error::AppError;
use taskhub_core::events::RecordEvent;
use taskhub_core::result::AppResult;
use taskhub_core::traits::{Clock, ManualClock};
use taskhub_core::types::RecordStatus;
use taskhub_entity::job::{ContactInfo, Job, QueueName, ReminderTask};
use taskhub_entity::record::RecordSnapshot;
use taskhub_worker::jobs::{CleanupJobHandler, ReminderJobHandler};
use taskhub_worker::{
    CleanupScheduler, EventPublisher, InMemoryBroker, JobExecutor, LifecycleEventBridge,
    QueueClient, RecordStore, ReminderDelivery, ReminderScheduler, WorkerPool, WorkerPoolConfig,
};

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Clock shared by every component
    pub clock: Arc<ManualClock>,
    /// Broker backing both queues
    pub broker: Arc<InMemoryBroker>,
    /// Record layer stand-in
    pub records: Arc<InMemoryRecords>,
    /// Notification layer stand-in
    pub delivery: Arc<RecordingDelivery>,
    /// Worker serving the `reminder` queue
    pub reminder_worker: WorkerPool,
    /// Worker serving the `cleanup` queue
    pub cleanup_worker: WorkerPool,
    bridge: LifecycleEventBridge,
    events: tokio::sync::Mutex<mpsc::Receiver<RecordEvent>>,
}

impl TestApp {
    /// Create a new test application
    pub async fn new() -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap(),
        ));
        let broker = Arc::new(InMemoryBroker::new(clock.clone()));
        let records = Arc::new(InMemoryRecords::default());
        let delivery = Arc::new(RecordingDelivery::default());

        let reminder_queue = QueueClient::new(QueueName::Reminder, broker.clone(), clock.clone());
        let cleanup_queue = QueueClient::new(QueueName::Cleanup, broker.clone(), clock.clone());

        let cleanup = Arc::new(
            CleanupScheduler::new(cleanup_queue.clone(), CleanupConfig::default())
                .await
                .expect("Failed to create cleanup scheduler"),
        );

        let (events, rx) = EventPublisher::channel(64);
        let bridge = LifecycleEventBridge::new(
            ReminderScheduler::new(reminder_queue.clone()),
            records.clone(),
        );

        let mut executor = JobExecutor::new();
        executor.register(Arc::new(ReminderJobHandler::new(
            records.clone(),
            delivery.clone(),
        )));
        executor.register(Arc::new(CleanupJobHandler::new(records.clone())));
        let executor = Arc::new(executor);

        let worker = |queue: QueueName| {
            WorkerPool::new(
                queue,
                broker.clone(),
                executor.clone(),
                clock.clone(),
                pool_config(),
                format!("test-{queue}"),
            )
        };
        let reminder_worker = worker(QueueName::Reminder);
        let cleanup_worker = worker(QueueName::Cleanup);

        let state = AppState {
            reminder_queue,
            cleanup_queue,
            cleanup,
            events,
            clock: clock.clone(),
        };

        Self {
            router: build_router(state),
            clock,
            broker,
            records,
            delivery,
            reminder_worker,
            cleanup_worker,
            bridge,
            events: tokio::sync::Mutex::new(rx),
        }
    }

    /// Current time on the shared clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Move the shared clock forward
    pub fn advance(&self, by: chrono::Duration) {
        self.clock.advance(by);
    }

    /// Apply every event accepted so far through the lifecycle bridge.
    ///
    /// Returns the number of events applied.
    pub async fn apply_events(&self) -> usize {
        let mut rx = self.events.lock().await;
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.bridge.dispatch(event).await;
            applied += 1;
        }
        applied
    }

    /// Jobs of a queue, oldest first
    pub fn jobs(&self, queue: QueueName) -> Vec<Job> {
        self.broker.jobs_in(queue)
    }

    /// POST a lifecycle event and apply it
    pub async fn send_event(&self, event: Value) -> TestResponse {
        let response = self.request("POST", "/queue/events", Some(event)).await;
        self.apply_events().await;
        response
    }

    /// Make an HTTP request to the test app
    pub async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body_str))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }
}

fn pool_config() -> WorkerPoolConfig {
    WorkerPoolConfig {
        concurrency: 1,
        poll_interval: Duration::from_millis(10),
        lease: Duration::from_secs(30),
        max_backoff: Duration::from_secs(3600),
        shutdown_timeout: Duration::from_secs(1),
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body
    pub body: Value,
}

/// Record layer kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryRecords {
    records: Mutex<HashMap<Uuid, RecordSnapshot>>,
    contacts: Mutex<HashMap<Uuid, ContactInfo>>,
    /// `older_than_days` of every purge request
    pub purges: Mutex<Vec<u32>>,
}

impl InMemoryRecords {
    /// Create a record with a reachable owner.
    pub fn create(&self, title: &str, due_at: Option<DateTime<Utc>>) -> RecordSnapshot {
        let record = RecordSnapshot {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: title.to_string(),
            status: RecordStatus::Pending,
            due_at,
            reminder_sent: false,
            completed_at: None,
        };
        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        self.contacts.lock().unwrap().insert(
            record.owner_id,
            ContactInfo {
                email: "grace@example.com".to_string(),
                name: "Grace Hopper".to_string(),
            },
        );
        record
    }

    /// Change the status of a record.
    pub fn set_status(&self, id: Uuid, status: RecordStatus) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.status = status;
        }
    }

    /// Current state of a record.
    pub fn get(&self, id: Uuid) -> Option<RecordSnapshot> {
        self.records.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecords {
    async fn get_record(&self, record_id: Uuid) -> AppResult<Option<RecordSnapshot>> {
        Ok(self.get(record_id))
    }

    async fn owner_contact(&self, owner_id: Uuid) -> AppResult<Option<ContactInfo>> {
        Ok(self.contacts.lock().unwrap().get(&owner_id).cloned())
    }

    async fn mark_reminder_sent(&self, record_id: Uuid) -> AppResult<bool> {
        Ok(match self.records.lock().unwrap().get_mut(&record_id) {
            Some(record) => {
                record.reminder_sent = true;
                true
            }
            None => false,
        })
    }

    async fn purge_completed_older_than(&self, days: u32) -> AppResult<u64> {
        self.purges.lock().unwrap().push(days);
        Ok(0)
    }
}

/// Notification layer that records deliveries and can fail on demand.
#[derive(Debug, Default)]
pub struct RecordingDelivery {
    /// Reminders delivered so far
    pub sent: Mutex<Vec<ReminderTask>>,
    /// Deliveries to refuse before succeeding
    pub refuse_next: Mutex<u32>,
}

#[async_trait]
impl ReminderDelivery for RecordingDelivery {
    async fn deliver_reminder(&self, task: &ReminderTask) -> AppResult<Uuid> {
        let mut refuse = self.refuse_next.lock().unwrap();
        if *refuse > 0 {
            *refuse -= 1;
            return Err(AppError::external("notification service unavailable"));
        }
        self.sent.lock().unwrap().push(task.clone());
        Ok(Uuid::new_v4())
    }
}
