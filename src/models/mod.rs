//! Data models for lostpets.
//!
//! This module contains the filter vocabulary used by the query compiler and
//! the registry records it runs against.

mod filter;
mod matches;
mod record;

pub use filter::{Comparator, Filter, FilterGroup, FilterValue};
pub use matches::Match;
pub use record::{Pet, PetType, Posting, RecordKind, Report, Sighting, SourceRecord, Tag};
