//! Comparator resolution.
//!
//! Turns one `(field, placeholder, filter)` triple into a SQL fragment that
//! refers to its value through a named `:placeholder`, plus the value to bind.
//!
//! Equality on text is case-insensitive: the column is wrapped in `lower()`
//! and compared with `like` against the lower-cased value. `%` and `_` in the
//! value are not escaped and therefore act as wildcards.

use crate::models::{Comparator, Filter, FilterValue};
use crate::{Error, Result};

/// A resolved predicate fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Fragment text with at most one `:placeholder` reference.
    pub text: String,
    /// Value bound to the placeholder; `None` when no placeholder is used.
    pub value: Option<FilterValue>,
}

impl Resolved {
    fn bound(text: String, value: FilterValue) -> Self {
        Self {
            text,
            value: Some(value),
        }
    }
}

/// Resolves a filter against a physical field.
///
/// The filter is only read; normalized values are returned in
/// [`Resolved::value`].
///
/// # Errors
///
/// Returns [`Error::EmptyFilterValue`] for an `in` filter with an empty list
/// and [`Error::UnsupportedFilterType`] for an `in` filter whose value is not
/// a list.
pub fn resolve(field: &str, placeholder: &str, filter: &Filter) -> Result<Resolved> {
    match filter.comparator {
        Comparator::Eq => Ok(resolve_eq(field, placeholder, &filter.value)),
        Comparator::In => resolve_in(field, placeholder, &filter.value),
        op => Ok(Resolved::bound(
            format!("{field} {op} :{placeholder}"),
            filter.value.clone(),
        )),
    }
}

fn resolve_eq(field: &str, placeholder: &str, value: &FilterValue) -> Resolved {
    match value {
        FilterValue::Null => Resolved {
            text: format!("{field} IS NULL"),
            value: None,
        },
        FilterValue::String(s) => Resolved::bound(
            format!("lower({field}) like :{placeholder}"),
            FilterValue::String(s.to_lowercase()),
        ),
        other => Resolved::bound(format!("{field} = :{placeholder}"), other.clone()),
    }
}

fn resolve_in(field: &str, placeholder: &str, value: &FilterValue) -> Result<Resolved> {
    match value {
        FilterValue::StringList(items) if items.is_empty() => Err(empty(field)),
        FilterValue::IntegerList(items) if items.is_empty() => Err(empty(field)),
        FilterValue::StringList(items) => Ok(Resolved::bound(
            format!("lower({field}) IN (:{placeholder})"),
            FilterValue::StringList(items.iter().map(|s| s.to_lowercase()).collect()),
        )),
        FilterValue::IntegerList(items) => Ok(Resolved::bound(
            format!("{field} IN (:{placeholder})"),
            FilterValue::IntegerList(items.clone()),
        )),
        other => Err(Error::UnsupportedFilterType {
            comparator: Comparator::In,
            value_type: other.type_name(),
        }),
    }
}

fn empty(field: &str) -> Error {
    Error::EmptyFilterValue {
        field: field.to_string(),
    }
}
