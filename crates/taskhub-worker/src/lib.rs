//! Job scheduling and delayed execution for TaskHub.
//!
//! This crate provides:
//! - A broker abstraction with Postgres and in-memory implementations
//! - A typed queue client per named queue
//! - Worker pools that claim, execute, retry, and fail jobs
//! - The reminder scheduler and the cron-driven cleanup scheduler
//! - The bridge turning record lifecycle events into reminder calls
//! - Handlers for the `send-reminder` and `purge-completed` job types

pub mod bridge;
pub mod broker;
pub mod collaborators;
pub mod executor;
pub mod jobs;
pub mod queue;
pub mod reminder;
pub mod runner;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{EventPublisher, LifecycleEventBridge};
pub use broker::{EnqueueOutcome, InMemoryBroker, JobBroker, JobRef, PgBroker};
pub use collaborators::{PgRecordStore, PgReminderDelivery, RecordStore, ReminderDelivery};
pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use queue::{EnqueueOptions, QueueClient, QueueError};
pub use reminder::{ReminderScheduler, ScheduleOutcome};
pub use runner::{ProcessOutcome, RetentionSweeper, WorkerPool, WorkerPoolConfig};
pub use scheduler::{CleanupScheduler, TriggerReceipt};
