//! Read models of records owned by the record layer.

pub mod model;

pub use model::RecordSnapshot;
pub use taskhub_core::types::RecordStatus;
