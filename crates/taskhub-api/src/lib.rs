//! # taskhub-api
//!
//! HTTP API layer for TaskHub built on Axum.
//!
//! Exposes queue health, the manual cleanup trigger, lifecycle event
//! ingestion, and a liveness endpoint.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
