//! Record backend trait.

use crate::Result;
use crate::models::{PetType, Posting, RecordKind, Sighting};
use crate::query::{CompiledQuery, PlaceholderStyle};

/// Storage accessor for postings, sightings and pet types.
///
/// Queries take a [`CompiledQuery`] built with this backend's
/// [`placeholder_style`](Self::placeholder_style); an empty clause fetches
/// every record.
pub trait RecordBackend: Send + Sync {
    /// Placeholder spelling the backend binds positionally.
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Stores a posting with its pet, breeds and tag.
    ///
    /// Returns the stored copy with ids and a fresh `guid` assigned.
    fn insert_posting(&self, posting: &Posting) -> Result<Posting>;

    /// Stores a sighting with its pet, breeds and tag.
    ///
    /// Returns the stored copy with ids and a fresh `guid` assigned.
    fn insert_sighting(&self, sighting: &Sighting) -> Result<Sighting>;

    /// Returns postings matching the query, ordered by id.
    fn query_postings(&self, query: &CompiledQuery) -> Result<Vec<Posting>>;

    /// Returns sightings matching the query, ordered by id.
    fn query_sightings(&self, query: &CompiledQuery) -> Result<Vec<Sighting>>;

    /// Lists the pet types, ordered by id.
    fn pet_types(&self) -> Result<Vec<PetType>>;

    /// Returns the ids of the records of `kind` matching the query.
    fn query_ids(&self, kind: RecordKind, query: &CompiledQuery) -> Result<Vec<i64>> {
        Ok(match kind {
            RecordKind::Posting => self
                .query_postings(query)?
                .into_iter()
                .map(|p| p.report.id)
                .collect(),
            RecordKind::Sighting => self
                .query_sightings(query)?
                .into_iter()
                .map(|s| s.report.id)
                .collect(),
        })
    }
}
