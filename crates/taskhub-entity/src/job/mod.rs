//! Deferred job entities.

pub mod backoff;
pub mod counts;
pub mod model;
pub mod payload;
pub mod queue;
pub mod state;

pub use backoff::{BackoffKind, BackoffPolicy};
pub use counts::QueueCounts;
pub use model::{Job, NewJob};
pub use payload::{CleanupTask, ContactInfo, ReminderTask};
pub use queue::{JobType, QueueName};
pub use state::{JobPriority, JobState};
