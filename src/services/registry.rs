//! Registry service.
//!
//! Entry point for the CLI: record lookups and listings through the query
//! compiler, record creation with background match search, and match
//! bookkeeping.

use super::{MatchQueue, MatchSearchEngine};
use crate::config::LostPetsConfig;
use crate::models::{
    Filter, FilterGroup, Match, PetType, Posting, RecordKind, Sighting, SourceRecord,
};
use crate::notify::Notifier;
use crate::query::{CompiledQuery, FieldMap, compile_with_style};
use crate::storage::{MatchBackend, RecordBackend, RegistryStore};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

/// High-level registry operations over a storage backend.
pub struct RegistryService {
    store: Arc<dyn RegistryStore>,
    posting_fields: FieldMap,
    sighting_fields: FieldMap,
    queue: Option<MatchQueue>,
}

impl std::fmt::Debug for RegistryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryService")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl RegistryService {
    /// Creates a service with the built-in field maps and no match search.
    #[must_use]
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            store,
            posting_fields: FieldMap::postings(),
            sighting_fields: FieldMap::sightings(),
            queue: None,
        }
    }

    /// Creates a fully wired service: configured field maps and a running
    /// match queue.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn from_config(
        store: Arc<dyn RegistryStore>,
        notifier: Arc<dyn Notifier>,
        config: &LostPetsConfig,
    ) -> Self {
        let postings = config.fields.postings_map();
        let sightings = config.fields.sightings_map();
        let engine = MatchSearchEngine::new(Arc::clone(&store), notifier)
            .with_field_maps(postings.clone(), sightings.clone());
        let queue = MatchQueue::start(
            Arc::new(engine),
            config.matching.workers,
            config.matching.queue_capacity,
        );
        Self::new(store)
            .with_field_maps(postings, sightings)
            .with_match_queue(queue)
    }

    /// Replaces the field maps used for listings and lookups.
    #[must_use]
    pub fn with_field_maps(mut self, postings: FieldMap, sightings: FieldMap) -> Self {
        self.posting_fields = postings;
        self.sighting_fields = sightings;
        self
    }

    /// Runs a match search for every record created from now on.
    #[must_use]
    pub fn with_match_queue(mut self, queue: MatchQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Compiles filter groups for `kind` in the backend's placeholder style.
    ///
    /// # Errors
    ///
    /// Returns the compiler's error unchanged.
    pub fn compile(&self, kind: RecordKind, groups: &[FilterGroup]) -> Result<CompiledQuery> {
        let fields = match kind {
            RecordKind::Posting => &self.posting_fields,
            RecordKind::Sighting => &self.sighting_fields,
        };
        compile_with_style(fields, groups, self.store.placeholder_style())
    }

    /// Lists postings matching any of `groups`; no groups lists all.
    ///
    /// # Errors
    ///
    /// Returns an error if compilation or the query fails.
    #[instrument(skip(self, groups), fields(operation = "list_postings", groups = groups.len()))]
    pub fn list_postings(&self, groups: &[FilterGroup]) -> Result<Vec<Posting>> {
        let query = self.compile(RecordKind::Posting, groups)?;
        self.store.query_postings(&query)
    }

    /// Lists sightings matching any of `groups`; no groups lists all.
    ///
    /// # Errors
    ///
    /// Returns an error if compilation or the query fails.
    #[instrument(skip(self, groups), fields(operation = "list_sightings", groups = groups.len()))]
    pub fn list_sightings(&self, groups: &[FilterGroup]) -> Result<Vec<Sighting>> {
        let query = self.compile(RecordKind::Sighting, groups)?;
        self.store.query_sightings(&query)
    }

    /// Looks up a posting by its private reference.
    pub fn posting_by_guid(&self, guid: &str) -> Result<Option<Posting>> {
        let Some(group) = guid_group(guid) else {
            return Ok(None);
        };
        Ok(self.list_postings(&[group])?.into_iter().next())
    }

    /// Looks up a sighting by its private reference.
    pub fn sighting_by_guid(&self, guid: &str) -> Result<Option<Sighting>> {
        let Some(group) = guid_group(guid) else {
            return Ok(None);
        };
        Ok(self.list_sightings(&[group])?.into_iter().next())
    }

    /// Looks up a posting by id.
    pub fn posting_by_id(&self, id: i64) -> Result<Option<Posting>> {
        let group = FilterGroup::new().with("id", Filter::eq(id));
        Ok(self.list_postings(&[group])?.into_iter().next())
    }

    /// Looks up a sighting by id.
    pub fn sighting_by_id(&self, id: i64) -> Result<Option<Sighting>> {
        let group = FilterGroup::new().with("id", Filter::eq(id));
        Ok(self.list_sightings(&[group])?.into_iter().next())
    }

    /// Postings filed from `email`, compared case-insensitively.
    pub fn postings_by_email(&self, email: &str) -> Result<Vec<Posting>> {
        self.list_postings(&[FilterGroup::new().with("email", Filter::eq(email))])
    }

    /// Sightings filed from `email`, compared case-insensitively.
    pub fn sightings_by_email(&self, email: &str) -> Result<Vec<Sighting>> {
        self.list_sightings(&[FilterGroup::new().with("email", Filter::eq(email))])
    }

    /// Sightings matched to the posting with reference `posting_guid`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no posting has that reference.
    pub fn matching_sightings(&self, posting_guid: &str) -> Result<Vec<Sighting>> {
        let posting = self
            .posting_by_guid(posting_guid)?
            .ok_or_else(|| Error::NotFound(format!("posting {posting_guid}")))?;
        let ids: Vec<i64> = self
            .store
            .matches_for_posting(posting.report.id)?
            .into_iter()
            .map(|m| m.sighting_id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.list_sightings(&[FilterGroup::new().with("id", Filter::one_of(ids))])
    }

    /// Postings matched to the sighting with reference `sighting_guid`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no sighting has that reference.
    pub fn matching_postings(&self, sighting_guid: &str) -> Result<Vec<Posting>> {
        let sighting = self
            .sighting_by_guid(sighting_guid)?
            .ok_or_else(|| Error::NotFound(format!("sighting {sighting_guid}")))?;
        let ids: Vec<i64> = self
            .store
            .matches_for_sighting(sighting.report.id)?
            .into_iter()
            .map(|m| m.posting_id)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.list_postings(&[FilterGroup::new().with("id", Filter::one_of(ids))])
    }

    /// Stores a posting and queues a match search for it.
    ///
    /// The search runs in the background; its outcome never affects the
    /// result.
    #[instrument(skip(self, posting), fields(operation = "add_posting"))]
    pub fn add_posting(&self, posting: &Posting) -> Result<Posting> {
        let stored = self.store.insert_posting(posting)?;
        self.queue_search(SourceRecord::Posting(stored.clone()));
        Ok(stored)
    }

    /// Stores a sighting and queues a match search for it.
    #[instrument(skip(self, sighting), fields(operation = "add_sighting"))]
    pub fn add_sighting(&self, sighting: &Sighting) -> Result<Sighting> {
        let stored = self.store.insert_sighting(sighting)?;
        self.queue_search(SourceRecord::Sighting(stored.clone()));
        Ok(stored)
    }

    fn queue_search(&self, record: SourceRecord) {
        match &self.queue {
            Some(queue) => {
                queue.enqueue(record);
            },
            None => tracing::debug!("No match queue configured, search skipped"),
        }
    }

    /// Known pet types.
    pub fn pet_types(&self) -> Result<Vec<PetType>> {
        self.store.pet_types()
    }

    /// Match rows for a posting.
    pub fn matches_for_posting(&self, posting_id: i64) -> Result<Vec<Match>> {
        self.store.matches_for_posting(posting_id)
    }

    /// Match rows for a sighting.
    pub fn matches_for_sighting(&self, sighting_id: i64) -> Result<Vec<Match>> {
        self.store.matches_for_sighting(sighting_id)
    }

    /// Marks a match as contacted now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the pair was never matched.
    pub fn contact_match(&self, posting_id: i64, sighting_id: i64) -> Result<()> {
        if self.store.update_match(posting_id, sighting_id, Utc::now())? {
            Ok(())
        } else {
            Err(Error::NotFound(format!(
                "match ({posting_id}, {sighting_id})"
            )))
        }
    }

    /// Deletes a match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the pair was never matched.
    pub fn remove_match(&self, posting_id: i64, sighting_id: i64) -> Result<()> {
        if self.store.remove_match(posting_id, sighting_id)? {
            Ok(())
        } else {
            Err(Error::NotFound(format!(
                "match ({posting_id}, {sighting_id})"
            )))
        }
    }

    /// Stops accepting searches and waits for queued ones to finish.
    pub async fn shutdown(self) {
        if let Some(queue) = self.queue {
            queue.shutdown().await;
        }
    }
}

/// Equality group for a reference, or `None` if it is not a UUID.
///
/// Guards the `like` comparison against wildcard input.
fn guid_group(guid: &str) -> Option<FilterGroup> {
    let parsed = uuid::Uuid::parse_str(guid.trim()).ok()?;
    Some(FilterGroup::new().with("guid", Filter::eq(parsed.hyphenated().to_string())))
}
