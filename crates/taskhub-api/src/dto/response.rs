//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use taskhub_entity::job::QueueCounts;

/// Body of `GET /queue/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueHealthResponse {
    /// Counts of the `reminder` queue
    pub reminder: QueueCounts,
    /// Counts of the `cleanup` queue
    pub cleanup: QueueCounts,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
}

/// Body of `POST /queue/cleanup/trigger`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupTriggerResponse {
    /// Human-readable confirmation
    pub message: String,
    /// The enqueued purge job
    pub job_id: Uuid,
    /// When it was enqueued
    pub scheduled_at: DateTime<Utc>,
}

/// Body of `POST /queue/events`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAcceptedResponse {
    /// Event kind that was accepted
    pub kind: String,
    /// Record the event refers to
    pub record_id: Uuid,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the process answers
    pub status: String,
    /// Server version
    pub version: String,
}
