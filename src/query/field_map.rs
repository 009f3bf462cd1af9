//! Logical-to-physical field name translation.

use crate::models::RecordKind;
use std::collections::HashMap;

/// Built-in posting fields (logical name, physical column).
const POSTING_FIELDS: &[(&str, &str)] = &[
    ("id", "postings.id"),
    ("guid", "postings.guid"),
    ("name", "postings.name"),
    ("email", "postings.email"),
    ("date", "postings.date"),
    ("location", "postings.location"),
    ("petid", "pets.id"),
    ("petpictureid", "pets.picture_id"),
    ("pettypeid", "types.id"),
    ("pettype", "types.name"),
    ("petname", "pets.name"),
    ("petcolor", "pets.color"),
    ("petmarks", "pets.marks"),
    ("petbreeds", "pet_breeds.name"),
    ("pettagid", "tags.id"),
    ("pettagshape", "tags.shape"),
    ("pettagcolor", "tags.color"),
    ("pettagtext", "tags.text"),
];

/// Built-in sighting fields (logical name, physical column).
const SIGHTING_FIELDS: &[(&str, &str)] = &[
    ("id", "sightings.id"),
    ("guid", "sightings.guid"),
    ("name", "sightings.name"),
    ("email", "sightings.email"),
    ("date", "sightings.date"),
    ("location", "sightings.location"),
    ("incustody", "sightings.in_custody"),
    ("petid", "pets.id"),
    ("petpictureid", "pets.picture_id"),
    ("pettypeid", "types.id"),
    ("pettype", "types.name"),
    ("petname", "pets.name"),
    ("petcolor", "pets.color"),
    ("petmarks", "pets.marks"),
    ("petbreeds", "pet_breeds.name"),
    ("pettagid", "tags.id"),
    ("pettagshape", "tags.shape"),
    ("pettagcolor", "tags.color"),
    ("pettagtext", "tags.text"),
];

/// Maps lower-cased logical filter keys to physical column expressions.
///
/// Lookups are case-insensitive. Names without an entry pass through
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: HashMap<String, String>,
}

impl FieldMap {
    /// Creates an empty map (every name passes through).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from `(logical, physical)` pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (logical, physical) in pairs {
            map.insert(logical.as_ref(), physical);
        }
        map
    }

    /// Built-in map for postings.
    #[must_use]
    pub fn postings() -> Self {
        Self::from_pairs(POSTING_FIELDS.iter().copied())
    }

    /// Built-in map for sightings.
    #[must_use]
    pub fn sightings() -> Self {
        Self::from_pairs(SIGHTING_FIELDS.iter().copied())
    }

    /// Built-in map for the given record kind.
    #[must_use]
    pub fn for_kind(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Posting => Self::postings(),
            RecordKind::Sighting => Self::sightings(),
        }
    }

    /// Adds or replaces a mapping.
    pub fn insert(&mut self, logical: &str, physical: impl Into<String>) {
        self.fields.insert(logical.to_lowercase(), physical.into());
    }

    /// Applies configured overrides on top of this map.
    #[must_use]
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (logical, physical) in overrides {
            self.insert(logical, physical.clone());
        }
        self
    }

    /// Translates a logical name into its physical column.
    #[must_use]
    pub fn physical<'a>(&'a self, logical: &'a str) -> &'a str {
        self.fields
            .get(&logical.to_lowercase())
            .map_or(logical, String::as_str)
    }

    /// Number of explicit mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no mappings are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
