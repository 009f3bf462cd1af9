//! `SQLite` storage backend.
//!
//! - [`connection`]: lock acquisition and connection pragmas
//! - [`schema`]: embedded tables and seeded pet types
//! - [`rows`]: select building, row mapping and parameter binding
//! - [`metrics`]: per-operation metrics

mod backend;
mod connection;
mod metrics;
mod rows;
mod schema;

pub use backend::SqliteBackend;
pub use connection::{acquire_lock, configure_connection};
pub use metrics::{record_operation_metrics, status_of};
pub use schema::DEFAULT_PET_TYPES;
