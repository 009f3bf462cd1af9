//! Row mapping and parameter binding for the `SQLite` backend.

use crate::models::{Match, Pet, RecordKind, Report, Tag};
use crate::query::SqlParam;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::{ToSql, ToSqlOutput, Type, Value, ValueRef};

/// Separator used to aggregate breed names into one column.
const BREED_SEPARATOR: char = '\u{1f}';

/// Formats a timestamp the way dates are stored.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Self::Timestamp(ts) => ToSqlOutput::Owned(Value::Text(format_timestamp(ts))),
        })
    }
}

/// Builds the aggregate select for one record kind.
///
/// `where_sql` is either empty or starts with `" WHERE "`. Columns are read
/// back by [`report_from_row`]; sightings append `in_custody` last.
#[must_use]
pub fn select_sql(kind: RecordKind, where_sql: &str) -> String {
    let table = kind.plural();
    let extra = match kind {
        RecordKind::Posting => "",
        RecordKind::Sighting => ",\n    sightings.in_custody",
    };
    format!(
        "SELECT
    {table}.id, {table}.guid, {table}.date, {table}.location, {table}.name, {table}.email,
    pets.id, pets.picture_id, pets.name, pets.color, pets.marks,
    types.id, types.name,
    tags.id, tags.shape, tags.color, tags.text,
    group_concat(pet_breeds.name, char(31)){extra}
FROM {table}
LEFT JOIN pets ON pets.id = {table}.pet_id
LEFT JOIN types ON types.id = pets.type_id
LEFT JOIN pet_breeds ON pet_breeds.pet_id = pets.id
LEFT JOIN tags ON tags.pet_id = pets.id{where_sql}
GROUP BY {table}.id, pets.id, types.id, tags.id
ORDER BY {table}.id"
    )
}

/// Column index of `in_custody` in a sighting select.
pub const IN_CUSTODY_COLUMN: usize = 18;

/// Maps the shared columns of a select row.
pub fn report_from_row(row: &Row<'_>) -> rusqlite::Result<Report> {
    let date: String = row.get(2)?;
    let breeds: Option<String> = row.get(17)?;

    Ok(Report {
        id: row.get(0)?,
        guid: row.get(1)?,
        date: parse_timestamp(2, &date)?,
        location: row.get(3)?,
        name: row.get(4)?,
        email: row.get(5)?,
        pet: Pet {
            id: row.get::<_, Option<i64>>(6)?.unwrap_or_default(),
            picture_id: row.get(7)?,
            name: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            color: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            marks: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
            type_id: row.get::<_, Option<i64>>(11)?.unwrap_or_default(),
            type_name: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
            breeds: breeds
                .map(|b| b.split(BREED_SEPARATOR).map(String::from).collect())
                .unwrap_or_default(),
            tag: Tag {
                id: row.get::<_, Option<i64>>(13)?.unwrap_or_default(),
                shape: row.get::<_, Option<String>>(14)?.unwrap_or_default(),
                color: row.get::<_, Option<String>>(15)?.unwrap_or_default(),
                text: row.get::<_, Option<String>>(16)?.unwrap_or_default(),
            },
        },
    })
}

/// Maps a `postings_id, sightings_id, last_contacted` row.
pub fn match_from_row(row: &Row<'_>) -> rusqlite::Result<Match> {
    let last_contacted: Option<String> = row.get(2)?;
    Ok(Match {
        posting_id: row.get(0)?,
        sighting_id: row.get(1)?,
        last_contacted: last_contacted
            .map(|raw| parse_timestamp(2, &raw))
            .transpose()?,
    })
}
