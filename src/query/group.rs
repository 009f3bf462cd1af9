//! Filter group compilation.

use super::field_map::FieldMap;
use super::resolver::resolve;
use crate::models::{FilterGroup, FilterValue};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap, HashSet};

/// AND-joined predicate text with `:name` placeholders and their values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledPredicate {
    /// Predicate text; empty when the group contributed nothing.
    pub text: String,
    /// Values keyed by placeholder name.
    pub params: BTreeMap<String, FilterValue>,
}

impl CompiledPredicate {
    /// Returns true if the group produced no predicate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Compiles one filter group into an AND-joined predicate.
///
/// Placeholders are named `<physical field><index>` where the index counts
/// the filters seen so far on that physical field, starting at 0. A name
/// already taken by another column (`a` + `10` against `a1` + `0`) moves the
/// index on to the next free one. Fields are visited in the group's sorted
/// order, so the output is identical across calls.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if a field does not translate to a plain
/// column identifier, and the first resolver error otherwise.
pub fn compile_group(fields: &FieldMap, group: &FilterGroup) -> Result<CompiledPredicate> {
    let mut fragments = Vec::new();
    let mut params = BTreeMap::new();
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();

    for (logical, filters) in group.iter() {
        if filters.is_empty() {
            continue;
        }
        let physical = fields.physical(logical);
        if !is_column_identifier(physical) {
            return Err(Error::InvalidInput(format!(
                "field '{logical}' does not map to a column identifier"
            )));
        }

        for filter in filters {
            let index = occurrences.entry(physical).or_insert(0);
            let mut placeholder = format!("{physical}{index}");
            while taken.contains(&placeholder) {
                *index += 1;
                placeholder = format!("{physical}{index}");
            }
            *index += 1;
            taken.insert(placeholder.clone());

            let resolved = resolve(physical, &placeholder, filter)?;
            if let Some(value) = resolved.value {
                params.insert(placeholder, value);
            }
            fragments.push(resolved.text);
        }
    }

    Ok(CompiledPredicate {
        text: fragments.join(" and "),
        params,
    })
}

/// Accepts `column` or `table.column` style names built from
/// `[A-Za-z0-9_]`, not starting with a digit.
pub(crate) fn is_column_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Comparator, Filter};
    use chrono::{TimeZone, Utc};
    use test_case::test_case;

    fn created_at_map() -> FieldMap {
        FieldMap::from_pairs([("createdat", "created_at")])
    }

    #[test]
    fn test_range_on_one_field_gets_distinct_placeholders() {
        let from = Utc.with_ymd_and_hms(2014, 4, 12, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        let group = FilterGroup::new()
            .with("createdAt", Filter::new(Comparator::GtEq, from))
            .with("createdAt", Filter::new(Comparator::LtEq, to));

        let predicate = compile_group(&created_at_map(), &group).unwrap();

        assert_eq!(
            predicate.text,
            "created_at >= :created_at0 and created_at <= :created_at1"
        );
        assert_eq!(predicate.params["created_at0"], FilterValue::Timestamp(from));
        assert_eq!(predicate.params["created_at1"], FilterValue::Timestamp(to));
    }

    #[test]
    fn test_fields_join_with_and_in_sorted_order() {
        let group = FilterGroup::new()
            .with("petname", Filter::eq("Rex"))
            .with("age", Filter::eq(3));

        let predicate = compile_group(&FieldMap::postings(), &group).unwrap();

        assert_eq!(
            predicate.text,
            "age = :age0 and lower(pets.name) like :pets.name0"
        );
        assert_eq!(predicate.params.len(), 2);
    }

    #[test]
    fn test_null_filter_adds_no_param() {
        let group = FilterGroup::new().with("petmarks", Filter::is_null());
        let predicate = compile_group(&FieldMap::postings(), &group).unwrap();

        assert_eq!(predicate.text, "pets.marks IS NULL");
        assert!(predicate.params.is_empty());
    }

    #[test]
    fn test_aliases_of_one_column_do_not_collide() {
        let group = FilterGroup::new()
            .with("petcolor", Filter::eq("brown"))
            .with("pets.color", Filter::eq("black"));

        let predicate = compile_group(&FieldMap::postings(), &group).unwrap();

        assert_eq!(
            predicate.text,
            "lower(pets.color) like :pets.color0 and lower(pets.color) like :pets.color1"
        );
        assert_eq!(predicate.params.len(), 2);
    }

    #[test]
    fn test_numbered_column_names_do_not_share_placeholders() {
        let mut group = FilterGroup::new();
        for i in 0..11 {
            group = group.with("a", Filter::new(Comparator::Gt, i64::from(i)));
        }
        group = group.with("a1", Filter::eq(999));

        let predicate = compile_group(&FieldMap::new(), &group).unwrap();

        assert_eq!(predicate.params.len(), 12);
        assert_eq!(predicate.params["a10"], FilterValue::Integer(10));
        assert_eq!(predicate.params["a11"], FilterValue::Integer(999));
        assert!(predicate.text.ends_with("a > :a10 and a1 = :a11"));
    }

    #[test]
    fn test_empty_group_is_not_an_error() {
        let predicate = compile_group(&FieldMap::new(), &FilterGroup::new()).unwrap();
        assert!(predicate.is_empty());
        assert!(predicate.params.is_empty());
    }

    #[test]
    fn test_first_error_aborts_group() {
        let group = FilterGroup::new()
            .with("a", Filter::eq("x"))
            .with("b", Filter::one_of(Vec::<i64>::new()));

        let err = compile_group(&FieldMap::new(), &group).unwrap_err();
        assert!(matches!(err, Error::EmptyFilterValue { field } if field == "b"));
    }

    #[test]
    fn test_compilation_is_idempotent() {
        let group = FilterGroup::new()
            .with("location", Filter::eq("Riverside"))
            .with("pettype", Filter::one_of(vec!["Dog", "Cat"]))
            .with("petid", Filter::new(Comparator::Gt, 10));

        let first = compile_group(&FieldMap::sightings(), &group).unwrap();
        let second = compile_group(&FieldMap::sightings(), &group).unwrap();
        assert_eq!(first, second);
    }

    #[test_case("created_at", true; "plain")]
    #[test_case("pets.color", true; "qualified")]
    #[test_case("_x1", true; "underscore")]
    #[test_case("1col", false; "leading digit")]
    #[test_case("name; drop table pets", false; "injection")]
    #[test_case("a..b", false; "empty segment")]
    #[test_case("", false; "empty")]
    fn test_column_identifier(name: &str, expected: bool) {
        assert_eq!(is_column_identifier(name), expected);
    }

    #[test]
    fn test_non_identifier_field_is_rejected() {
        let group = FilterGroup::new().with("1=1 or name", Filter::eq("x"));
        let err = compile_group(&FieldMap::new(), &group).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
