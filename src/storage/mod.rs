//! Storage layer.
//!
//! Backends implement [`RecordBackend`] (postings, sightings, pet types) and
//! [`MatchBackend`] (match rows). `SQLite` is always available; PostgreSQL
//! is compiled in with the `postgres` feature.

// Dropping the connection guard a few statements early gains nothing.
#![allow(clippy::significant_drop_tightening)]

pub mod migrations;
pub mod postgres;
pub mod sqlite;
pub mod traits;

#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;
pub use traits::{MatchBackend, RecordBackend};

/// A backend serving both records and matches.
pub trait RegistryStore: RecordBackend + MatchBackend {}

impl<T: RecordBackend + MatchBackend> RegistryStore for T {}
