//! Route definitions for the TaskHub HTTP API.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(queue_routes())
        .route("/health", get(handlers::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Queue endpoints: health, manual cleanup, lifecycle events
fn queue_routes() -> Router<AppState> {
    Router::new()
        .route("/queue/health", get(handlers::queue::queue_health))
        .route("/queue/cleanup/trigger", post(handlers::queue::trigger_cleanup))
        .route("/queue/events", post(handlers::queue::ingest_event))
}
