//! Match-search engine.
//!
//! When a posting or sighting is created, records of the opposite kind that
//! share any of its location, pet type, pet name, pet color or pet marks are
//! recorded as matches and the submitter is notified once.
//!
//! The engine never fails: every error is logged and counted, and the
//! returned [`MatchOutcome`] is informational.

use crate::Error;
use crate::models::{Filter, FilterGroup, RecordKind, Report, SourceRecord};
use crate::notify::Notifier;
use crate::query::{FieldMap, compile_with_style};
use crate::storage::{MatchBackend, RecordBackend, RegistryStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Counts produced by one search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Records of the opposite kind that matched.
    pub candidates: usize,
    /// Match rows newly inserted; rediscovered pairs are not counted.
    pub recorded: usize,
    /// Errors swallowed along the way.
    pub failures: usize,
}

/// Finds and records matches for newly created records.
#[derive(Clone)]
pub struct MatchSearchEngine {
    store: Arc<dyn RegistryStore>,
    notifier: Arc<dyn Notifier>,
    posting_fields: FieldMap,
    sighting_fields: FieldMap,
}

impl std::fmt::Debug for MatchSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchSearchEngine")
            .field("posting_fields", &self.posting_fields.len())
            .field("sighting_fields", &self.sighting_fields.len())
            .finish_non_exhaustive()
    }
}

impl MatchSearchEngine {
    /// Creates an engine with the built-in field maps.
    #[must_use]
    pub fn new(store: Arc<dyn RegistryStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            posting_fields: FieldMap::postings(),
            sighting_fields: FieldMap::sightings(),
        }
    }

    /// Replaces the field maps used to query each kind.
    #[must_use]
    pub fn with_field_maps(mut self, postings: FieldMap, sightings: FieldMap) -> Self {
        self.posting_fields = postings;
        self.sighting_fields = sightings;
        self
    }

    const fn fields_for(&self, kind: RecordKind) -> &FieldMap {
        match kind {
            RecordKind::Posting => &self.posting_fields,
            RecordKind::Sighting => &self.sighting_fields,
        }
    }

    /// Searches the opposite kind for `source`, records matches and
    /// notifies the submitter.
    #[instrument(
        skip(self, source),
        fields(
            operation = "find_and_record_matches",
            kind = %source.kind(),
            record_id = source.report().id
        )
    )]
    pub fn find_and_record_matches(&self, source: &SourceRecord) -> MatchOutcome {
        let start = Instant::now();
        let outcome = self.search(source);

        let status = if outcome.failures == 0 { "success" } else { "partial" };
        metrics::counter!("match_search_total", "kind" => source.kind().as_str(), "status" => status)
            .increment(1);
        metrics::counter!("match_search_candidates_total").increment(outcome.candidates as u64);
        metrics::counter!("match_search_recorded_total").increment(outcome.recorded as u64);
        metrics::counter!("match_search_failures_total").increment(outcome.failures as u64);
        metrics::histogram!("match_search_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        tracing::info!(
            candidates = outcome.candidates,
            recorded = outcome.recorded,
            failures = outcome.failures,
            "Match search finished"
        );
        outcome
    }

    fn search(&self, source: &SourceRecord) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();
        let kind = source.kind();
        let target = kind.opposite();
        let report = source.report();

        let groups = candidate_groups(report);
        let query = match compile_with_style(
            self.fields_for(target),
            &groups,
            self.store.placeholder_style(),
        ) {
            Ok(query) => query,
            Err(e) => {
                log_failure("compile", &e);
                outcome.failures += 1;
                return outcome;
            },
        };

        let ids = match self.store.query_ids(target, &query) {
            Ok(ids) => ids,
            Err(e) => {
                log_failure("query_candidates", &e);
                outcome.failures += 1;
                return outcome;
            },
        };
        outcome.candidates = ids.len();

        for candidate in ids {
            let (posting_id, sighting_id) = match kind {
                RecordKind::Posting => (report.id, candidate),
                RecordKind::Sighting => (candidate, report.id),
            };
            match self.store.add_match(posting_id, sighting_id) {
                Ok(true) => outcome.recorded += 1,
                Ok(false) => {
                    tracing::debug!(posting_id, sighting_id, "Match already recorded");
                },
                Err(e) => {
                    tracing::warn!(posting_id, sighting_id, error = %e, "Failed to record match");
                    outcome.failures += 1;
                },
            }
        }

        if outcome.candidates > 0 {
            if let Err(e) = self.notifier.notify(kind, &report.email, &report.guid) {
                log_failure("notify", &e);
                outcome.failures += 1;
            }
        }
        outcome
    }
}

/// One single-field equality group per compared attribute.
///
/// Groups are OR-combined, so a candidate needs to share only one attribute.
/// Empty attributes still produce a group and match other empty values.
#[must_use]
pub fn candidate_groups(report: &Report) -> Vec<FilterGroup> {
    [
        ("location", &report.location),
        ("pettype", &report.pet.type_name),
        ("petname", &report.pet.name),
        ("petcolor", &report.pet.color),
        ("petmarks", &report.pet.marks),
    ]
    .into_iter()
    .map(|(field, value)| FilterGroup::new().with(field, Filter::eq(value.as_str())))
    .collect()
}

fn log_failure(stage: &'static str, error: &Error) {
    tracing::warn!(stage, error = %error, "Match search step failed");
}
