//! Storage backend traits.

mod matches;
mod records;

pub use matches::MatchBackend;
pub use records::RecordBackend;
