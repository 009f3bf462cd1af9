//! Posting and sighting records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two kinds of registry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A lost pet reported by its owner.
    Posting,
    /// A found pet reported by a finder.
    Sighting,
}

impl RecordKind {
    /// Returns the kind a match search runs against.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Posting => Self::Sighting,
            Self::Sighting => Self::Posting,
        }
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Posting => "posting",
            Self::Sighting => "sighting",
        }
    }

    /// Returns the plural label used in notifications and URLs.
    #[must_use]
    pub const fn plural(&self) -> &'static str {
        match self {
            Self::Posting => "postings",
            Self::Sighting => "sightings",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collar tag worn by a pet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    /// Storage identifier.
    pub id: i64,
    /// Tag shape (bone, circle, ...).
    pub shape: String,
    /// Tag color.
    pub color: String,
    /// Engraved text.
    pub text: String,
}

/// Description of the animal in a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Pet {
    /// Storage identifier.
    pub id: i64,
    /// Identifier of the uploaded picture, if any.
    pub picture_id: Option<i64>,
    /// Pet name.
    pub name: String,
    /// Coat color.
    pub color: String,
    /// Distinctive marks.
    pub marks: String,
    /// Identifier of the pet type.
    pub type_id: i64,
    /// Pet type name (dog, cat, ...).
    #[serde(rename = "type")]
    pub type_name: String,
    /// Breed names.
    pub breeds: Vec<String>,
    /// Collar tag.
    pub tag: Tag,
}

/// Fields shared by postings and sightings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Public storage identifier.
    #[serde(default)]
    pub id: i64,
    /// Private reference handed only to the submitter.
    #[serde(default)]
    pub guid: String,
    /// The animal.
    #[serde(default)]
    pub pet: Pet,
    /// When the pet was lost or found.
    pub date: DateTime<Utc>,
    /// Where the pet was lost or found.
    #[serde(default)]
    pub location: String,
    /// Submitter name.
    #[serde(default)]
    pub name: String,
    /// Submitter email; receives match notifications.
    #[serde(default)]
    pub email: String,
}

impl Report {
    /// Creates a report with the given date and empty fields.
    #[must_use]
    pub fn new(date: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            guid: String::new(),
            pet: Pet::default(),
            date,
            location: String::new(),
            name: String::new(),
            email: String::new(),
        }
    }
}

/// A lost pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Report fields.
    #[serde(flatten)]
    pub report: Report,
}

impl Posting {
    /// Wraps a report.
    #[must_use]
    pub const fn new(report: Report) -> Self {
        Self { report }
    }
}

/// A found pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sighting {
    /// Report fields.
    #[serde(flatten)]
    pub report: Report,
    /// Whether the finder is holding the animal.
    #[serde(default)]
    pub in_custody: bool,
}

impl Sighting {
    /// Wraps a report.
    #[must_use]
    pub const fn new(report: Report, in_custody: bool) -> Self {
        Self { report, in_custody }
    }
}

/// A record that can seed a match search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRecord {
    /// A newly created posting.
    Posting(Posting),
    /// A newly created sighting.
    Sighting(Sighting),
}

impl SourceRecord {
    /// Returns the record kind.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Posting(_) => RecordKind::Posting,
            Self::Sighting(_) => RecordKind::Sighting,
        }
    }

    /// Returns the shared report fields.
    #[must_use]
    pub const fn report(&self) -> &Report {
        match self {
            Self::Posting(p) => &p.report,
            Self::Sighting(s) => &s.report,
        }
    }
}

impl From<Posting> for SourceRecord {
    fn from(posting: Posting) -> Self {
        Self::Posting(posting)
    }
}

impl From<Sighting> for SourceRecord {
    fn from(sighting: Sighting) -> Self {
        Self::Sighting(sighting)
    }
}

/// A pet type offered by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetType {
    /// Storage identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
}
