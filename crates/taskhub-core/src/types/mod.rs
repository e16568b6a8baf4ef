//! Shared value types.

pub mod record_status;

pub use record_status::RecordStatus;
