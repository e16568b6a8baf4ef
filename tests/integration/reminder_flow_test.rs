//! End-to-end reminder flow: event ingest, scheduling, delivery, retries.

use serde_json::json;

use taskhub_core::types::RecordStatus;
use taskhub_entity::job::{JobState, QueueName};
use taskhub_worker::ProcessOutcome;

use crate::helpers::TestApp;

fn hours(n: i64) -> chrono::Duration {
    chrono::Duration::hours(n)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reminder_fires_once_a_day_before_due() {
    let app = TestApp::new().await;
    let due_at = app.now() + hours(48);
    let record = app.records.create("File taxes", Some(due_at));

    app.send_event(json!({
        "kind": "created",
        "recordId": record.id,
        "ownerId": record.owner_id,
        "dueAt": due_at,
    }))
    .await;

    let jobs = app.jobs(QueueName::Reminder);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].run_at, due_at - hours(24));
    assert_eq!(jobs[0].dedupe_key.as_deref(), Some(format!("reminder:{}", record.id).as_str()));

    // Not eligible yet.
    assert!(app.reminder_worker.process_next().await.unwrap().is_none());

    app.advance(hours(24));
    let outcome = app.reminder_worker.process_next().await.unwrap();
    assert!(matches!(outcome, Some(ProcessOutcome::Completed { .. })));

    let sent = app.delivery.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "File taxes");
    assert_eq!(sent[0].contact.email, "grace@example.com");
    assert!(app.records.get(record.id).unwrap().reminder_sent);

    let job = &app.jobs(QueueName::Reminder)[0];
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.result.as_ref().unwrap()["status"], "sent");

    // Nothing left to deliver.
    app.advance(hours(1));
    assert!(app.reminder_worker.process_next().await.unwrap().is_none());
    assert_eq!(app.delivery.sent.lock().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_duplicate_created_event_schedules_one_reminder() {
    let app = TestApp::new().await;
    let due_at = app.now() + hours(30);
    let record = app.records.create("Book flights", Some(due_at));
    let event = json!({
        "kind": "created",
        "recordId": record.id,
        "ownerId": record.owner_id,
        "dueAt": due_at,
    });

    app.send_event(event.clone()).await;
    app.send_event(event).await;

    assert_eq!(app.jobs(QueueName::Reminder).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_due_within_a_day_gets_no_reminder() {
    let app = TestApp::new().await;
    let due_at = app.now() + hours(3);
    let record = app.records.create("Call plumber", Some(due_at));

    app.send_event(json!({
        "kind": "created",
        "recordId": record.id,
        "ownerId": record.owner_id,
        "dueAt": due_at,
    }))
    .await;

    assert!(app.jobs(QueueName::Reminder).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_completing_record_cancels_reminder() {
    let app = TestApp::new().await;
    let due_at = app.now() + hours(48);
    let record = app.records.create("Submit report", Some(due_at));

    app.send_event(json!({
        "kind": "created",
        "recordId": record.id,
        "ownerId": record.owner_id,
        "dueAt": due_at,
    }))
    .await;

    app.records.set_status(record.id, RecordStatus::Completed);
    app.send_event(json!({
        "kind": "updated",
        "recordId": record.id,
        "ownerId": record.owner_id,
        "status": "completed",
    }))
    .await;

    assert_eq!(app.jobs(QueueName::Reminder)[0].state, JobState::Cancelled);

    app.advance(hours(24));
    assert!(app.reminder_worker.process_next().await.unwrap().is_none());
    assert!(app.delivery.sent.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_due_date_change_moves_reminder() {
    let app = TestApp::new().await;
    let old_due = app.now() + hours(48);
    let new_due = app.now() + hours(96);
    let record = app.records.create("Dentist", Some(old_due));

    app.send_event(json!({
        "kind": "created",
        "recordId": record.id,
        "ownerId": record.owner_id,
        "dueAt": old_due,
    }))
    .await;
    app.advance(chrono::Duration::minutes(1));
    app.send_event(json!({
        "kind": "dueDateChanged",
        "recordId": record.id,
        "ownerId": record.owner_id,
        "oldDueAt": old_due,
        "newDueAt": new_due,
    }))
    .await;

    let jobs = app.jobs(QueueName::Reminder);
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].state, JobState::Cancelled);
    assert_eq!(jobs[1].state, JobState::Scheduled);
    assert_eq!(jobs[1].run_at, new_due - hours(24));

    // The old fire time passes without a delivery.
    app.advance(hours(24));
    assert!(app.reminder_worker.process_next().await.unwrap().is_none());

    app.advance(hours(48));
    let outcome = app.reminder_worker.process_next().await.unwrap();
    assert!(matches!(outcome, Some(ProcessOutcome::Completed { .. })));
    assert_eq!(app.delivery.sent.lock().unwrap()[0].due_at, new_due);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_delivery_is_retried_with_backoff() {
    let app = TestApp::new().await;
    let due_at = app.now() + hours(25);
    let record = app.records.create("Pay rent", Some(due_at));
    *app.delivery.refuse_next.lock().unwrap() = 2;

    app.send_event(json!({
        "kind": "created",
        "recordId": record.id,
        "ownerId": record.owner_id,
        "dueAt": due_at,
    }))
    .await;

    app.advance(hours(1));
    let first = app.reminder_worker.process_next().await.unwrap();
    let Some(ProcessOutcome::Retrying { retry_at, .. }) = first else {
        panic!("expected a retry, got {first:?}");
    };
    assert_eq!(retry_at, app.now() + chrono::Duration::seconds(5));

    // Not before the backoff elapses.
    assert!(app.reminder_worker.process_next().await.unwrap().is_none());

    app.advance(chrono::Duration::seconds(5));
    let second = app.reminder_worker.process_next().await.unwrap();
    let Some(ProcessOutcome::Retrying { retry_at, .. }) = second else {
        panic!("expected a retry, got {second:?}");
    };
    assert_eq!(retry_at, app.now() + chrono::Duration::seconds(10));

    app.advance(chrono::Duration::seconds(10));
    let third = app.reminder_worker.process_next().await.unwrap();
    assert!(matches!(third, Some(ProcessOutcome::Completed { .. })));
    assert_eq!(app.delivery.sent.lock().unwrap().len(), 1);

    let job = &app.jobs(QueueName::Reminder)[0];
    assert_eq!(job.attempts, 3);
    assert_eq!(job.run_at, due_at - hours(24));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_record_deleted_before_fire_is_skipped() {
    let app = TestApp::new().await;
    let due_at = app.now() + hours(48);
    let record = app.records.create("Renew lease", Some(due_at));

    app.send_event(json!({
        "kind": "created",
        "recordId": record.id,
        "ownerId": record.owner_id,
        "dueAt": due_at,
    }))
    .await;
    // The record turns terminal without an event reaching the bridge.
    app.records.set_status(record.id, RecordStatus::Archived);

    app.advance(hours(24));
    let outcome = app.reminder_worker.process_next().await.unwrap();
    assert!(matches!(outcome, Some(ProcessOutcome::Completed { .. })));

    let job = &app.jobs(QueueName::Reminder)[0];
    assert_eq!(job.result, Some(json!({ "status": "skipped", "reason": "closed" })));
    assert!(app.delivery.sent.lock().unwrap().is_empty());
}
