//! # taskhub-database
//!
//! PostgreSQL connection management, migrations, and the repositories
//! backing the job broker and the record collaborators.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
