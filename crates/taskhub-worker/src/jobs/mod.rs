//! Built-in job handler implementations.

pub mod cleanup;
pub mod reminder;

pub use cleanup::CleanupJobHandler;
pub use reminder::ReminderJobHandler;
