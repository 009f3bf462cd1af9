//! # Lostpets
//!
//! Backend core for a lost-and-found pet registry.
//!
//! Owners of a lost pet file a *posting*; people who found an animal file a
//! *sighting*. Whenever a new record arrives, a background search looks for
//! plausible counterparts of the opposite kind and records them as matches.
//!
//! ## Features
//!
//! - Criteria-based query compiler turning filter groups into parameterized SQL
//! - Case-insensitive equality, set membership and relational comparators
//! - OR-combined filter groups with globally consistent positional parameters
//! - Background match search on a bounded worker pool
//! - Pluggable backends (`SQLite`, PostgreSQL behind the `postgres` feature)
//!
//! ## Example
//!
//! ```rust
//! use lostpets::models::{Filter, FilterGroup};
//! use lostpets::query::{FieldMap, compile};
//!
//! let fields = FieldMap::from_pairs([("petcolor", "pets.color")]);
//! let groups = [
//!     FilterGroup::new().with("petcolor", Filter::eq("Brown")),
//!     FilterGroup::new().with("location", Filter::eq("Riverside")),
//! ];
//!
//! let query = compile(&fields, &groups)?;
//! assert_eq!(
//!     query.where_clause,
//!     "(lower(pets.color) like $1) OR (lower(location) like $2)"
//! );
//! assert_eq!(query.args.len(), 2);
//! # Ok::<(), lostpets::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod models;
pub mod notify;
pub mod observability;
pub mod query;
pub mod services;
pub mod storage;

pub use config::LostPetsConfig;
pub use models::{
    Comparator, Filter, FilterGroup, FilterValue, Match, Pet, PetType, Posting, RecordKind, Report,
    Sighting, Tag,
};
pub use notify::{LogNotifier, Notifier, SmtpNotifier};
pub use query::{CompiledPredicate, CompiledQuery, FieldMap, PlaceholderStyle};
pub use services::{MatchOutcome, MatchQueue, MatchSearchEngine, RegistryService};
pub use storage::{MatchBackend, RecordBackend};

/// Error type for lostpets operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `EmptyFilterValue` | An `in` filter carries an empty list |
/// | `UnsupportedFilterType` | A filter value has no rendering for its comparator |
/// | `Compilation` | Named placeholders cannot be bound to positional ones |
/// | `InvalidInput` | Malformed filter syntax, config values or email addresses |
/// | `NotFound` | A record required by the operation does not exist |
/// | `OperationFailed` | Database, I/O, SMTP or queue failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// An `in` filter was given an empty set.
    ///
    /// Such a filter can never match and `IN ()` is not portable SQL, so the
    /// whole compilation is rejected.
    #[error("filter on '{field}' uses 'in' with no values")]
    EmptyFilterValue {
        /// Physical field the filter targeted.
        field: String,
    },

    /// A filter value's type has no mapping for its comparator.
    #[error("unsupported type for {comparator} filter: {value_type}")]
    UnsupportedFilterType {
        /// Comparator of the rejected filter.
        comparator: Comparator,
        /// Name of the value variant that was encountered.
        value_type: &'static str,
    },

    /// Binding named parameters to positional ones failed.
    ///
    /// Indicates a malformed predicate or a missing parameter and is treated
    /// as a programming defect.
    #[error("query compilation failed: {0}")]
    Compilation(String),

    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - Textual filter syntax cannot be parsed
    /// - A configuration value is out of range
    /// - A recipient address is not a valid mailbox
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A record required by the operation does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` or PostgreSQL statements fail
    /// - Filesystem I/O errors occur
    /// - SMTP delivery fails
    /// - The match queue is full or closed
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for lostpets operations.
pub type Result<T> = std::result::Result<T, Error>;
