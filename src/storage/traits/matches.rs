//! Match backend trait.

use crate::Result;
use crate::models::Match;
use chrono::{DateTime, Utc};

/// Persistence of posting/sighting matches.
///
/// A pair is stored at most once. Ids are always given posting first.
pub trait MatchBackend: Send + Sync {
    /// Records a match.
    ///
    /// Returns `false` if the pair was already recorded; that is not an error.
    fn add_match(&self, posting_id: i64, sighting_id: i64) -> Result<bool>;

    /// Sets the last-contacted time of a match.
    ///
    /// Returns `false` if the pair is unknown.
    fn update_match(
        &self,
        posting_id: i64,
        sighting_id: i64,
        contacted_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Deletes a match. Returns `false` if the pair is unknown.
    fn remove_match(&self, posting_id: i64, sighting_id: i64) -> Result<bool>;

    /// Lists matches of a posting, ordered by sighting id.
    fn matches_for_posting(&self, posting_id: i64) -> Result<Vec<Match>>;

    /// Lists matches of a sighting, ordered by posting id.
    fn matches_for_sighting(&self, sighting_id: i64) -> Result<Vec<Match>>;
}
