//! Application state shared across all handlers.

use std::sync::Arc;

use taskhub_core::traits::Clock;
use taskhub_worker::{CleanupScheduler, EventPublisher, QueueClient};

/// Shared dependencies passed to every handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Client of the `reminder` queue.
    pub reminder_queue: QueueClient,
    /// Client of the `cleanup` queue.
    pub cleanup_queue: QueueClient,
    /// Cleanup trigger, for manual runs.
    pub cleanup: Arc<CleanupScheduler>,
    /// Hands lifecycle events to the event bridge.
    pub events: EventPublisher,
    /// Time source for response timestamps.
    pub clock: Arc<dyn Clock>,
}
