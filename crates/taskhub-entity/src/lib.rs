//! # taskhub-entity
//!
//! Entity models for TaskHub. Jobs are rows of the broker's job table and
//! derive `sqlx::FromRow`; records are read-only snapshots of entities owned
//! by the external record layer.

pub mod job;
pub mod record;
