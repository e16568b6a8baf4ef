//! Domain events consumed by TaskHub.
//!
//! The record layer emits lifecycle events; the event bridge in
//! `taskhub-worker` turns them into reminder scheduling calls.

pub mod record;

pub use record::RecordEvent;
