//! Posting/sighting correspondences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate correspondence between a posting and a sighting.
///
/// Created by the match search, unique per pair. Only `last_contacted` is
/// ever updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// The lost-pet record.
    pub posting_id: i64,
    /// The found-pet record.
    pub sighting_id: i64,
    /// When the submitters were last put in touch.
    pub last_contacted: Option<DateTime<Utc>>,
}

impl Match {
    /// Creates a match that has not been contacted yet.
    #[must_use]
    pub const fn new(posting_id: i64, sighting_id: i64) -> Self {
        Self {
            posting_id,
            sighting_id,
            last_contacted: None,
        }
    }
}
