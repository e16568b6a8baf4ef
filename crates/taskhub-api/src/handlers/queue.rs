//! Queue operations: health snapshot, manual cleanup, event ingest.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use taskhub_core::error::AppError;
use taskhub_core::events::RecordEvent;
use taskhub_core::traits::Clock;

use crate::dto::response::{CleanupTriggerResponse, EventAcceptedResponse, QueueHealthResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /queue/health
pub async fn queue_health(
    State(state): State<AppState>,
) -> Result<Json<QueueHealthResponse>, ApiError> {
    let (reminder, cleanup) =
        tokio::try_join!(state.reminder_queue.health(), state.cleanup_queue.health())?;

    Ok(Json(QueueHealthResponse {
        reminder,
        cleanup,
        timestamp: state.clock.now(),
    }))
}

/// POST /queue/cleanup/trigger
pub async fn trigger_cleanup(
    State(state): State<AppState>,
) -> Result<Json<CleanupTriggerResponse>, ApiError> {
    let receipt = state.cleanup.trigger_now().await?;

    Ok(Json(CleanupTriggerResponse {
        message: "Cleanup job scheduled successfully".to_string(),
        job_id: receipt.job_id,
        scheduled_at: receipt.scheduled_at,
    }))
}

/// POST /queue/events
///
/// Accepts a record lifecycle event and returns before it is applied.
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(event): Json<RecordEvent>,
) -> Result<(StatusCode, Json<EventAcceptedResponse>), ApiError> {
    let accepted = EventAcceptedResponse {
        kind: event.kind().to_string(),
        record_id: event.record_id(),
    };

    if !state.events.publish(event) {
        return Err(AppError::service_unavailable("Event bridge is not accepting events").into());
    }

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}
