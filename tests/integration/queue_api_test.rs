//! Integration tests for the queue HTTP endpoints.

use http::StatusCode;
use serde_json::json;

use taskhub_entity::job::{JobState, QueueName};
use taskhub_worker::ProcessOutcome;

use crate::helpers::TestApp;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_reports_empty_queues() {
    let app = TestApp::new().await;

    let response = app.request("GET", "/queue/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    for queue in ["reminder", "cleanup"] {
        let counts = &response.body[queue];
        for field in ["waiting", "active", "completed", "failed", "delayed"] {
            assert_eq!(counts[field], 0, "{queue}.{field}");
        }
    }
    assert!(response.body["timestamp"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_counts_delayed_reminder() {
    let app = TestApp::new().await;
    let record = app
        .records
        .create("Renew passport", Some(app.now() + chrono::Duration::hours(72)));

    app.send_event(json!({
        "kind": "created",
        "recordId": record.id,
        "ownerId": record.owner_id,
        "dueAt": record.due_at,
    }))
    .await;

    let response = app.request("GET", "/queue/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["reminder"]["delayed"], 1);
    assert_eq!(response.body["reminder"]["waiting"], 0);

    app.advance(chrono::Duration::hours(48));
    let response = app.request("GET", "/queue/health", None).await;
    assert_eq!(response.body["reminder"]["delayed"], 0);
    assert_eq!(response.body["reminder"]["waiting"], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_trigger_cleanup_enqueues_purge() {
    let app = TestApp::new().await;

    let response = app.request("POST", "/queue/cleanup/trigger", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body["message"],
        "Cleanup job scheduled successfully"
    );
    let job_id = response.body["jobId"].as_str().expect("jobId").to_string();
    assert!(response.body["scheduledAt"].is_string());

    let jobs = app.jobs(QueueName::Cleanup);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id.to_string(), job_id);
    assert_eq!(jobs[0].payload, json!({ "olderThanDays": 30 }));

    let outcome = app.cleanup_worker.process_next().await.unwrap();
    assert!(matches!(outcome, Some(ProcessOutcome::Completed { .. })));
    assert_eq!(*app.records.purges.lock().unwrap(), vec![30]);

    let job = &app.jobs(QueueName::Cleanup)[0];
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.result, Some(json!({ "deleted": 0 })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_manual_triggers_are_not_deduplicated() {
    let app = TestApp::new().await;

    let first = app.request("POST", "/queue/cleanup/trigger", None).await;
    let second = app.request("POST", "/queue/cleanup/trigger", None).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert_ne!(first.body["jobId"], second.body["jobId"]);
    assert_eq!(app.jobs(QueueName::Cleanup).len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_event_is_accepted() {
    let app = TestApp::new().await;
    let record = app.records.create("Water plants", None);

    let response = app
        .request(
            "POST",
            "/queue/events",
            Some(json!({
                "kind": "deleted",
                "recordId": record.id,
                "ownerId": record.owner_id,
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["kind"], "deleted");
    assert_eq!(response.body["recordId"], record.id.to_string());
    assert_eq!(app.apply_events().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_event_kind_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(
            "POST",
            "/queue/events",
            Some(json!({ "kind": "renamed", "recordId": uuid::Uuid::new_v4() })),
        )
        .await;

    assert!(response.status.is_client_error());
    assert_eq!(app.apply_events().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_health() {
    let app = TestApp::new().await;

    let response = app.request("GET", "/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}
