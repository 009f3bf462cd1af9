//! Textual filter syntax.
//!
//! A group is a `;`-separated list of conditions:
//! - `petcolor=brown` - Equality (case-insensitive for text)
//! - `createdat>=2019-01-01` - Relational comparison on a date
//! - `id in 1,2,3` - Set membership
//! - `petmarks=null` - `IS NULL` test
//! - `petname='42'` - Quoted values are always text
//!
//! Values are typed in this order: `null`, integer, RFC 3339 timestamp,
//! `YYYY-MM-DD` date (midnight UTC), text.

use crate::models::{Comparator, Filter, FilterGroup, FilterValue};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Operators in match order; longer spellings first.
const OPERATORS: &[&str] = &["<=", ">=", "!=", "<>", "==", "=", "<", ">"];

/// Parses one filter group.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if a condition has no field name or no
/// recognized operator.
///
/// # Examples
///
/// ```
/// use lostpets::query::parse_filter_group;
///
/// let group = parse_filter_group("petcolor=Brown; id in 3,4").unwrap();
/// assert_eq!(group.len(), 2);
/// ```
pub fn parse_filter_group(input: &str) -> Result<FilterGroup> {
    let mut group = FilterGroup::new();
    for condition in input.split(';').map(str::trim).filter(|c| !c.is_empty()) {
        let (field, filter) = parse_condition(condition)?;
        group.push(field, filter);
    }
    Ok(group)
}

fn parse_condition(condition: &str) -> Result<(String, Filter)> {
    let field_len = condition
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        .unwrap_or(condition.len());
    let (field, rest) = condition.split_at(field_len);
    if field.is_empty() {
        return Err(Error::InvalidInput(format!(
            "missing field name in '{condition}'"
        )));
    }
    let rest = rest.trim_start();

    if let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) {
        let comparator = Comparator::parse(op).ok_or_else(|| {
            Error::InvalidInput(format!("unknown operator '{op}' in '{condition}'"))
        })?;
        let value = parse_scalar(rest[op.len()..].trim());
        return Ok((field.to_string(), Filter::new(comparator, value)));
    }

    let lowered = rest.to_ascii_lowercase();
    if lowered == "in" || lowered.starts_with("in ") || lowered.starts_with("in\t") {
        let value = parse_list(rest[2..].trim());
        return Ok((field.to_string(), Filter::one_of(value)));
    }

    Err(Error::InvalidInput(format!(
        "expected an operator after '{field}' in '{condition}'"
    )))
}

/// Parses a single value.
#[must_use]
pub fn parse_scalar(raw: &str) -> FilterValue {
    if let Some(text) = unquote(raw) {
        return FilterValue::String(text.to_string());
    }
    if raw.eq_ignore_ascii_case("null") {
        return FilterValue::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return FilterValue::Integer(i);
    }
    if let Some(ts) = parse_timestamp(raw) {
        return FilterValue::Timestamp(ts);
    }
    FilterValue::String(raw.to_string())
}

/// Parses a comma-separated list; all-integer lists stay integers.
fn parse_list(raw: &str) -> FilterValue {
    let items: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let integers: Option<Vec<i64>> = items.iter().map(|s| s.parse().ok()).collect();
    match integers {
        Some(values) if !values.is_empty() => FilterValue::IntegerList(values),
        _ => FilterValue::StringList(
            items
                .into_iter()
                .map(|s| unquote(s).unwrap_or(s).to_string())
                .collect(),
        ),
    }
}

fn unquote(raw: &str) -> Option<&str> {
    ['\'', '"'].into_iter().find_map(|q| {
        raw.strip_prefix(q)
            .and_then(|s| s.strip_suffix(q))
            .filter(|_| raw.len() >= 2)
    })
}

/// Parses an RFC 3339 timestamp or a `YYYY-MM-DD` date (midnight UTC).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    #[test]
    fn test_parse_equality() {
        let group = parse_filter_group("petcolor=Brown").unwrap();
        assert_eq!(group.get("petcolor"), Some(&[Filter::eq("Brown")][..]));
    }

    #[test]
    fn test_parse_range_on_one_field() {
        let group = parse_filter_group("createdat >= 2014-04-12; createdat<=2019-01-01T00:00:00Z")
            .unwrap();
        let filters = group.get("createdat").unwrap();

        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].comparator, Comparator::GtEq);
        assert_eq!(
            filters[0].value,
            FilterValue::Timestamp(Utc.with_ymd_and_hms(2014, 4, 12, 0, 0, 0).unwrap())
        );
        assert_eq!(filters[1].comparator, Comparator::LtEq);
    }

    #[test]
    fn test_parse_in_lists() {
        let group = parse_filter_group("id IN 1, 2,3; pettype in Dog,'Cat'").unwrap();

        assert_eq!(
            group.get("id").unwrap()[0].value,
            FilterValue::IntegerList(vec![1, 2, 3])
        );
        assert_eq!(
            group.get("pettype").unwrap()[0].value,
            FilterValue::from(vec!["Dog", "Cat"])
        );
    }

    #[test]
    fn test_parse_empty_in_list_is_kept_for_compiler() {
        let group = parse_filter_group("id in").unwrap();
        assert_eq!(
            group.get("id").unwrap()[0].value,
            FilterValue::StringList(vec![])
        );
    }

    #[test_case("null", FilterValue::Null; "null")]
    #[test_case("NULL", FilterValue::Null; "upper null")]
    #[test_case("56", FilterValue::Integer(56); "integer")]
    #[test_case("-3", FilterValue::Integer(-3); "negative")]
    #[test_case("'56'", FilterValue::String("56".into()); "quoted integer")]
    #[test_case("\"null\"", FilterValue::String("null".into()); "quoted null")]
    #[test_case("Riverside Park", FilterValue::String("Riverside Park".into()); "text")]
    #[test_case("'", FilterValue::String("'".into()); "lone quote")]
    fn test_parse_scalar(raw: &str, expected: FilterValue) {
        assert_eq!(parse_scalar(raw), expected);
    }

    #[test]
    fn test_parse_timestamp_with_offset() {
        assert_eq!(
            parse_scalar("2019-01-01T02:00:00+02:00"),
            FilterValue::Timestamp(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test_case("=brown"; "missing field")]
    #[test_case("petcolor brown"; "missing operator")]
    #[test_case("petcolor ~ brown"; "unknown operator")]
    fn test_parse_errors(input: &str) {
        assert!(matches!(
            parse_filter_group(input),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_blank_input() {
        assert!(parse_filter_group("  ; ;").unwrap().is_empty());
    }
}
