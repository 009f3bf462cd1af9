//! Filter criteria for record queries.
//!
//! A [`FilterGroup`] maps logical field names to the filters that apply to
//! them. Filters under one field (and across fields) combine with AND; several
//! groups handed to the query compiler combine with OR.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// Equality; case-insensitive for text values, `IS NULL` for null.
    Eq,
    /// Set membership.
    In,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    LtEq,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    GtEq,
    /// Not equal.
    NotEq,
}

impl Comparator {
    /// Returns the SQL operator text.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::In => "in",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::NotEq => "!=",
        }
    }

    /// Parses an operator string.
    ///
    /// Accepts the SQL spellings plus `==` and `<>`; `in` is case-insensitive.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "=" | "==" => Some(Self::Eq),
            "in" => Some(Self::In),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::LtEq),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::GtEq),
            "!=" | "<>" => Some(Self::NotEq),
            _ => None,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Comparator {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| crate::Error::InvalidInput(format!("unknown comparator: {s}")))
    }
}

/// Value compared by a [`Filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// SQL `NULL`.
    Null,
    /// Text value.
    String(String),
    /// Integer value.
    Integer(i64),
    /// List of text values (for `in`).
    StringList(Vec<String>),
    /// List of integer values (for `in`).
    IntegerList(Vec<i64>),
    /// Point in time.
    Timestamp(DateTime<Utc>),
}

impl FilterValue {
    /// Returns a short name of the variant, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::StringList(_) => "string list",
            Self::IntegerList(_) => "integer list",
            Self::Timestamp(_) => "timestamp",
        }
    }

    /// Returns true for the list variants.
    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::StringList(_) | Self::IntegerList(_))
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(value: Vec<String>) -> Self {
        Self::StringList(value)
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(value: Vec<&str>) -> Self {
        Self::StringList(value.into_iter().map(String::from).collect())
    }
}

impl From<Vec<i64>> for FilterValue {
    fn from(value: Vec<i64>) -> Self {
        Self::IntegerList(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One condition on a logical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Comparison operator.
    pub comparator: Comparator,
    /// Compared value.
    pub value: FilterValue,
}

impl Filter {
    /// Creates a filter.
    #[must_use]
    pub fn new(comparator: Comparator, value: impl Into<FilterValue>) -> Self {
        Self {
            comparator,
            value: value.into(),
        }
    }

    /// Creates an equality filter.
    #[must_use]
    pub fn eq(value: impl Into<FilterValue>) -> Self {
        Self::new(Comparator::Eq, value)
    }

    /// Creates a set-membership filter.
    #[must_use]
    pub fn one_of(values: impl Into<FilterValue>) -> Self {
        Self::new(Comparator::In, values)
    }

    /// Creates an `IS NULL` filter.
    #[must_use]
    pub const fn is_null() -> Self {
        Self {
            comparator: Comparator::Eq,
            value: FilterValue::Null,
        }
    }
}

/// AND-combined filters keyed by logical field name.
///
/// Backed by a `BTreeMap` so compiled SQL is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterGroup {
    fields: BTreeMap<String, Vec<Filter>>,
}

impl FilterGroup {
    /// Creates an empty group.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Adds a filter on `field`.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, filter: Filter) -> Self {
        self.push(field, filter);
        self
    }

    /// Adds a filter on `field` in place.
    pub fn push(&mut self, field: impl Into<String>, filter: Filter) {
        self.fields.entry(field.into()).or_default().push(filter);
    }

    /// Returns the filters registered for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[Filter]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Iterates fields in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Filter])> {
        self.fields
            .iter()
            .map(|(field, filters)| (field.as_str(), filters.as_slice()))
    }

    /// Returns true if no field carries any filter.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.values().all(Vec::is_empty)
    }

    /// Number of fields in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl<K: Into<String>> FromIterator<(K, Filter)> for FilterGroup {
    fn from_iter<I: IntoIterator<Item = (K, Filter)>>(iter: I) -> Self {
        let mut group = Self::new();
        for (field, filter) in iter {
            group.push(field, filter);
        }
        group
    }
}
