//! Query compilation.
//!
//! Several filter groups are compiled independently, bound to positional
//! parameters and joined with `OR`. Binding produces a [`Statement`], a flat
//! list of literal SQL segments and parameter slots. Placeholder numbers are
//! only assigned when the joined statement is rendered, in one left-to-right
//! walk, so the `k`-th placeholder in the text is always `args[k - 1]`.

use super::field_map::FieldMap;
use super::group::{CompiledPredicate, compile_group};
use crate::models::{FilterGroup, FilterValue};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

/// A positional query argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    /// SQL `NULL`.
    Null,
    /// Text.
    Text(String),
    /// 64-bit integer.
    Integer(i64),
    /// UTC timestamp.
    Timestamp(DateTime<Utc>),
}

impl std::fmt::Display for SqlParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

/// How positional placeholders are spelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PlaceholderStyle {
    /// `$1, $2, ...` (PostgreSQL).
    #[default]
    Dollar,
    /// `?1, ?2, ...` (`SQLite`).
    Numbered,
}

impl PlaceholderStyle {
    fn write(self, out: &mut String, n: usize) {
        let sigil = match self {
            Self::Dollar => '$',
            Self::Numbered => '?',
        };
        // writing to a String cannot fail
        let _ = write!(out, "{sigil}{n}");
    }
}

/// A compiled `WHERE` clause and its positional arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledQuery {
    /// Condition text without the `WHERE` keyword; empty means no filtering.
    pub where_clause: String,
    /// Arguments; `args[k - 1]` binds placeholder `k`.
    pub args: Vec<SqlParam>,
}

impl CompiledQuery {
    /// Returns true if the query filters nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.where_clause.is_empty()
    }

    /// Returns `" WHERE <clause>"`, or an empty string when unfiltered.
    #[must_use]
    pub fn where_sql(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_clause)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Sql(String),
    Param(SqlParam),
}

/// Literal SQL interleaved with unnumbered parameter slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Statement {
    segments: Vec<Segment>,
}

impl Statement {
    fn push_sql(&mut self, sql: &str) {
        if sql.is_empty() {
            return;
        }
        if let Some(Segment::Sql(last)) = self.segments.last_mut() {
            last.push_str(sql);
        } else {
            self.segments.push(Segment::Sql(sql.to_string()));
        }
    }

    fn push_param(&mut self, param: SqlParam) {
        self.segments.push(Segment::Param(param));
    }

    /// Pushes one slot per element for lists, separated by `", "`.
    fn push_value(&mut self, value: &FilterValue) {
        match value {
            FilterValue::Null => self.push_param(SqlParam::Null),
            FilterValue::String(s) => self.push_param(SqlParam::Text(s.clone())),
            FilterValue::Integer(i) => self.push_param(SqlParam::Integer(*i)),
            FilterValue::Timestamp(ts) => self.push_param(SqlParam::Timestamp(*ts)),
            FilterValue::StringList(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.push_sql(", ");
                    }
                    self.push_param(SqlParam::Text(item.clone()));
                }
            },
            FilterValue::IntegerList(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.push_sql(", ");
                    }
                    self.push_param(SqlParam::Integer(*item));
                }
            },
        }
    }

    fn append(&mut self, other: Self) {
        for segment in other.segments {
            match segment {
                Segment::Sql(sql) => self.push_sql(&sql),
                Segment::Param(param) => self.push_param(param),
            }
        }
    }

    fn render(self, style: PlaceholderStyle) -> CompiledQuery {
        let mut where_clause = String::new();
        let mut args = Vec::new();
        for segment in self.segments {
            match segment {
                Segment::Sql(sql) => where_clause.push_str(&sql),
                Segment::Param(param) => {
                    args.push(param);
                    style.write(&mut where_clause, args.len());
                },
            }
        }
        CompiledQuery { where_clause, args }
    }
}

/// Binds the `:name` placeholders of a predicate to its parameters.
///
/// `::` is kept as a literal (PostgreSQL casts). A name is the longest run of
/// `[A-Za-z0-9_.]` after the colon.
fn bind(predicate: &CompiledPredicate) -> Result<Statement> {
    let text = predicate.text.as_str();
    let mut statement = Statement::default();
    let mut literal_start = 0;
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(':') {
        let colon = pos + offset;
        if text[colon + 1..].starts_with(':') {
            pos = colon + 2;
            continue;
        }

        let name_len = text[colon + 1..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(text.len() - colon - 1);
        if name_len == 0 {
            return Err(Error::Compilation(format!(
                "dangling ':' at offset {colon} in '{text}'"
            )));
        }
        let name = &text[colon + 1..=colon + name_len];
        let value = predicate.params.get(name).ok_or_else(|| {
            Error::Compilation(format!("no value bound for placeholder ':{name}'"))
        })?;
        if value.is_list() && list_is_empty(value) {
            return Err(Error::Compilation(format!(
                "placeholder ':{name}' is bound to an empty list"
            )));
        }

        statement.push_sql(&text[literal_start..colon]);
        statement.push_value(value);
        pos = colon + 1 + name_len;
        literal_start = pos;
    }
    statement.push_sql(&text[literal_start..]);

    Ok(statement)
}

fn list_is_empty(value: &FilterValue) -> bool {
    match value {
        FilterValue::StringList(items) => items.is_empty(),
        FilterValue::IntegerList(items) => items.is_empty(),
        _ => false,
    }
}

/// Compiles OR-combined filter groups with `$n` placeholders.
///
/// # Errors
///
/// Propagates the first group compilation or binding error.
pub fn compile(fields: &FieldMap, groups: &[FilterGroup]) -> Result<CompiledQuery> {
    compile_with_style(fields, groups, PlaceholderStyle::Dollar)
}

/// Compiles OR-combined filter groups with the given placeholder style.
///
/// Groups that produce no predicate are skipped; if none contributes, the
/// result is empty.
///
/// # Errors
///
/// Propagates the first group compilation or binding error.
pub fn compile_with_style(
    fields: &FieldMap,
    groups: &[FilterGroup],
    style: PlaceholderStyle,
) -> Result<CompiledQuery> {
    let mut statement = Statement::default();
    let mut contributed = 0;

    for group in groups {
        let predicate = compile_group(fields, group)?;
        if predicate.is_empty() {
            continue;
        }
        let bound = bind(&predicate)?;

        if contributed > 0 {
            statement.push_sql(" OR ");
        }
        statement.push_sql("(");
        statement.append(bound);
        statement.push_sql(")");
        contributed += 1;
    }

    Ok(statement.render(style))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Comparator, Filter};
    use chrono::TimeZone;
    use proptest::prelude::*;
    use regex::Regex;
    use std::collections::BTreeMap;

    fn predicate(text: &str, params: &[(&str, FilterValue)]) -> CompiledPredicate {
        CompiledPredicate {
            text: text.to_string(),
            params: params
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    /// Placeholder numbers in textual order.
    fn placeholder_numbers(clause: &str) -> Vec<usize> {
        let re = Regex::new(r"[$?](\d+)").unwrap();
        re.captures_iter(clause)
            .map(|c| c[1].parse().unwrap())
            .collect()
    }

    #[test]
    fn test_zero_groups_compile_to_nothing() {
        let query = compile(&FieldMap::new(), &[]).unwrap();
        assert!(query.is_empty());
        assert!(query.args.is_empty());
        assert_eq!(query.where_sql(), "");
    }

    #[test]
    fn test_empty_groups_are_dropped() {
        let groups = [
            FilterGroup::new(),
            FilterGroup::new().with("age", Filter::eq(3)),
            FilterGroup::new(),
        ];
        let query = compile(&FieldMap::new(), &groups).unwrap();

        assert_eq!(query.where_clause, "(age = $1)");
        assert_eq!(query.where_sql(), " WHERE (age = $1)");
    }

    #[test]
    fn test_single_null_filter() {
        let groups = [FilterGroup::new().with("petmarks", Filter::is_null())];
        let query = compile(&FieldMap::postings(), &groups).unwrap();

        assert_eq!(query.where_clause, "(pets.marks IS NULL)");
        assert!(query.args.is_empty());
    }

    #[test]
    fn test_multi_group_renumbering() {
        let groups = [
            FilterGroup::new().with("location", Filter::eq("Park")),
            FilterGroup::new()
                .with("age", Filter::new(Comparator::Gt, 2))
                .with("age", Filter::new(Comparator::Lt, 9)),
        ];
        let query = compile(&FieldMap::new(), &groups).unwrap();

        assert_eq!(
            query.where_clause,
            "(lower(location) like $1) OR (age > $2 and age < $3)"
        );
        assert_eq!(
            query.args,
            vec![
                SqlParam::Text("park".into()),
                SqlParam::Integer(2),
                SqlParam::Integer(9),
            ]
        );
    }

    #[test]
    fn test_created_at_id_age_scenario() {
        let fields = FieldMap::from_pairs([("createdat", "created_at")]);
        let from = Utc.with_ymd_and_hms(2014, 4, 12, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        let groups = [
            FilterGroup::new()
                .with("createdat", Filter::new(Comparator::GtEq, from))
                .with("createdat", Filter::new(Comparator::LtEq, to)),
            FilterGroup::new().with("id", Filter::one_of(vec!["ABC", "oNE", "two"])),
            FilterGroup::new().with("age", Filter::eq(56)),
        ];

        let query = compile(&fields, &groups).unwrap();

        assert_eq!(
            query.where_clause,
            "(created_at >= $1 and created_at <= $2) OR (lower(id) IN ($3, $4, $5)) OR (age = $6)"
        );
        assert_eq!(
            query.args,
            vec![
                SqlParam::Timestamp(from),
                SqlParam::Timestamp(to),
                SqlParam::Text("abc".into()),
                SqlParam::Text("one".into()),
                SqlParam::Text("two".into()),
                SqlParam::Integer(56),
            ]
        );
        // four filter bindings, the list among them spread over three slots
        assert_eq!(query.where_clause.matches(" OR ").count(), 2);
    }

    #[test]
    fn test_numbered_style() {
        let groups = [
            FilterGroup::new().with("a", Filter::eq(1)),
            FilterGroup::new().with("b", Filter::one_of(vec![2_i64, 3])),
        ];
        let query = compile_with_style(&FieldMap::new(), &groups, PlaceholderStyle::Numbered)
            .unwrap();

        assert_eq!(query.where_clause, "(a = ?1) OR (b IN (?2, ?3))");
        assert_eq!(query.args.len(), 3);
    }

    #[test]
    fn test_eleventh_filter_keeps_its_own_value() {
        let mut group = FilterGroup::new();
        for i in 0..11 {
            group = group.with("a", Filter::new(Comparator::Gt, i64::from(i)));
        }
        group = group.with("a1", Filter::eq(999));

        let query = compile(&FieldMap::new(), &[group]).unwrap();

        let expected: Vec<SqlParam> = (0..11)
            .map(SqlParam::Integer)
            .chain(std::iter::once(SqlParam::Integer(999)))
            .collect();
        assert_eq!(query.args, expected);
        assert!(query.where_clause.ends_with("a > $11 and a1 = $12)"));
    }

    #[test]
    fn test_errors_abort_the_whole_call() {
        let groups = [
            FilterGroup::new().with("a", Filter::eq(1)),
            FilterGroup::new().with("b", Filter::one_of(Vec::<String>::new())),
        ];
        let err = compile(&FieldMap::new(), &groups).unwrap_err();
        assert!(matches!(err, Error::EmptyFilterValue { .. }));

        let groups = [FilterGroup::new().with("b", Filter::one_of(4))];
        let err = compile(&FieldMap::new(), &groups).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedFilterType {
                value_type: "integer",
                ..
            }
        ));
    }

    #[test]
    fn test_bind_prefix_names_do_not_clash() {
        let p = predicate(
            "x = :f1 and y = :f10",
            &[
                ("f1", FilterValue::Integer(1)),
                ("f10", FilterValue::Integer(10)),
            ],
        );
        let query = bind(&p).unwrap().render(PlaceholderStyle::Dollar);

        assert_eq!(query.where_clause, "x = $1 and y = $2");
        assert_eq!(query.args, vec![SqlParam::Integer(1), SqlParam::Integer(10)]);
    }

    #[test]
    fn test_bind_keeps_double_colon() {
        let p = predicate(
            "x::text = :x0",
            &[("x0", FilterValue::String("a".into()))],
        );
        let query = bind(&p).unwrap().render(PlaceholderStyle::Dollar);
        assert_eq!(query.where_clause, "x::text = $1");
    }

    #[test]
    fn test_bind_missing_param_is_compilation_error() {
        let p = predicate("x = :missing", &[]);
        assert!(matches!(bind(&p), Err(Error::Compilation(_))));

        let p = predicate("x = :", &[]);
        assert!(matches!(bind(&p), Err(Error::Compilation(_))));
    }

    fn arb_value() -> impl Strategy<Value = FilterValue> {
        prop_oneof![
            "[a-zA-Z]{1,8}".prop_map(FilterValue::String),
            any::<i64>().prop_map(FilterValue::Integer),
            prop::collection::vec("[a-z]{1,4}", 1..4).prop_map(FilterValue::StringList),
            prop::collection::vec(any::<i64>(), 1..4).prop_map(FilterValue::IntegerList),
            Just(FilterValue::Null),
        ]
    }

    fn arb_group() -> impl Strategy<Value = FilterGroup> {
        prop::collection::vec(
            (
                prop::sample::select(vec!["petname", "location", "age", "id"]),
                arb_value(),
            ),
            0..4,
        )
        .prop_map(|entries| {
            entries
                .into_iter()
                .map(|(field, value)| {
                    let filter = if value.is_list() {
                        Filter::one_of(value)
                    } else {
                        Filter::eq(value)
                    };
                    (field, filter)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_placeholders_are_sequential(groups in prop::collection::vec(arb_group(), 0..5)) {
            let query = compile(&FieldMap::postings(), &groups).unwrap();
            let numbers = placeholder_numbers(&query.where_clause);

            prop_assert_eq!(numbers.len(), query.args.len());
            for (i, n) in numbers.iter().enumerate() {
                prop_assert_eq!(*n, i + 1);
            }
        }

        #[test]
        fn prop_compile_is_deterministic(groups in prop::collection::vec(arb_group(), 0..5)) {
            let first = compile(&FieldMap::sightings(), &groups).unwrap();
            let second = compile(&FieldMap::sightings(), &groups).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
