//! # taskhub-core
//!
//! Core crate for the TaskHub reminder and cleanup engine. Contains the
//! configuration schema, the unified error system, the clock abstraction
//! used by every time-dependent component, and the record lifecycle
//! events consumed by the event bridge.
//!
//! This crate has **no** internal dependencies on other TaskHub crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
