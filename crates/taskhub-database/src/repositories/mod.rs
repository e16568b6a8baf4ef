//! Repository implementations for TaskHub tables.

pub mod job;
pub mod notification;
pub mod record;

pub use job::JobRepository;
pub use notification::NotificationRepository;
pub use record::RecordRepository;

use taskhub_core::error::{AppError, ErrorKind};

/// Map a sqlx error to an [`AppError`].
///
/// Connectivity failures become [`ErrorKind::ServiceUnavailable`] so callers
/// can tell "broker unreachable" apart from a rejected query.
pub(crate) fn db_error(context: &str, err: sqlx::Error) -> AppError {
    let kind = match &err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::Database,
    };
    AppError::with_source(kind, format!("{context}: {err}"), err)
}
