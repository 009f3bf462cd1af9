//! `SQLite` record and match backend.

use super::connection::{acquire_lock, configure_connection};
use super::metrics::{record_operation_metrics, status_of};
use super::rows::{
    IN_CUSTODY_COLUMN, format_timestamp, match_from_row, report_from_row, select_sql,
};
use super::schema::{DEFAULT_PET_TYPES, SCHEMA};
use crate::models::{Match, Pet, PetType, Posting, RecordKind, Report, Sighting};
use crate::query::{CompiledQuery, PlaceholderStyle, SqlParam};
use crate::storage::traits::{MatchBackend, RecordBackend};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

/// `SQLite`-backed registry store.
///
/// Holds a single `Mutex<Connection>`; WAL mode and `busy_timeout` keep
/// contention from other processes tolerable.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

fn op_error(operation: &str) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

impl SqliteBackend {
    /// Opens (or creates) the database at `db_path` and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema fails.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_db_dir".to_string(),
                cause: e.to_string(),
            })?;
        }
        let conn = Connection::open(&db_path).map_err(op_error("open_sqlite"))?;

        let backend = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        backend.initialize()?;
        Ok(backend)
    }

    /// Creates an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(op_error("open_sqlite_in_memory"))?;
        let backend = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        backend.initialize()?;
        Ok(backend)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;
        conn.execute_batch(SCHEMA)
            .map_err(op_error("create_schema"))?;

        let mut stmt = conn
            .prepare("INSERT OR IGNORE INTO types (name) VALUES (?1)")
            .map_err(op_error("seed_types"))?;
        for name in DEFAULT_PET_TYPES {
            stmt.execute([name]).map_err(op_error("seed_types"))?;
        }
        Ok(())
    }

    /// Inserts the pet, its breeds and tag; returns the pet id.
    fn insert_pet(conn: &Connection, pet: &Pet) -> Result<i64> {
        let type_id = Self::resolve_type_id(conn, pet)?;
        conn.execute(
            "INSERT INTO pets (picture_id, type_id, name, color, marks) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![pet.picture_id, type_id, pet.name, pet.color, pet.marks],
        )
        .map_err(op_error("insert_pet"))?;
        let pet_id = conn.last_insert_rowid();

        for breed in pet.breeds.iter().filter(|b| !b.is_empty()) {
            conn.execute(
                "INSERT INTO pet_breeds (pet_id, name) VALUES (?1, ?2)",
                params![pet_id, breed],
            )
            .map_err(op_error("insert_breed"))?;
        }

        conn.execute(
            "INSERT INTO tags (pet_id, shape, text, color) VALUES (?1, ?2, ?3, ?4)",
            params![pet_id, pet.tag.shape, pet.tag.text, pet.tag.color],
        )
        .map_err(op_error("insert_tag"))?;

        Ok(pet_id)
    }

    /// Uses `type_id` when set, otherwise looks the type up by name.
    fn resolve_type_id(conn: &Connection, pet: &Pet) -> Result<Option<i64>> {
        if pet.type_id > 0 {
            return Ok(Some(pet.type_id));
        }
        if pet.type_name.is_empty() {
            return Ok(None);
        }
        conn.query_row(
            "SELECT id FROM types WHERE lower(name) = lower(?1)",
            [&pet.type_name],
            |row| row.get(0),
        )
        .optional()
        .map_err(op_error("resolve_pet_type"))?
        .map(Some)
        .ok_or_else(|| Error::InvalidInput(format!("unknown pet type '{}'", pet.type_name)))
    }

    /// Inserts a report row and returns the stored report.
    fn insert_report(
        &self,
        kind: RecordKind,
        report: &Report,
        in_custody: bool,
    ) -> Result<(Report, bool)> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(op_error("begin_transaction"))?;

        let pet_id = Self::insert_pet(&tx, &report.pet)?;
        let guid = uuid::Uuid::new_v4().to_string();
        let date = format_timestamp(&report.date);
        match kind {
            RecordKind::Posting => tx.execute(
                "INSERT INTO postings (guid, pet_id, date, location, name, email)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![guid, pet_id, date, report.location, report.name, report.email],
            ),
            RecordKind::Sighting => tx.execute(
                "INSERT INTO sightings (guid, pet_id, date, location, name, email, in_custody)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    guid,
                    pet_id,
                    date,
                    report.location,
                    report.name,
                    report.email,
                    in_custody
                ],
            ),
        }
        .map_err(op_error("insert_record"))?;
        let id = tx.last_insert_rowid();

        let where_sql = format!(" WHERE {}.id = ?1", kind.plural());
        let mut stored = Self::select(&tx, kind, &where_sql, &[SqlParam::Integer(id)])?;
        tx.commit().map_err(op_error("commit_transaction"))?;

        stored.pop().ok_or_else(|| Error::OperationFailed {
            operation: "insert_record".to_string(),
            cause: format!("{kind} {id} missing after insert"),
        })
    }

    /// Runs the aggregate select; the flag is `in_custody` (false for postings).
    fn select(
        conn: &Connection,
        kind: RecordKind,
        where_sql: &str,
        args: &[SqlParam],
    ) -> Result<Vec<(Report, bool)>> {
        let sql = select_sql(kind, where_sql);
        let mut stmt = conn.prepare(&sql).map_err(op_error("prepare_select"))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                let report = report_from_row(row)?;
                let in_custody = match kind {
                    RecordKind::Posting => false,
                    RecordKind::Sighting => row.get(IN_CUSTODY_COLUMN)?,
                };
                Ok((report, in_custody))
            })
            .map_err(op_error("query_records"))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(op_error("read_records"))
    }

    fn query_kind(&self, kind: RecordKind, query: &CompiledQuery) -> Result<Vec<(Report, bool)>> {
        let conn = acquire_lock(&self.conn);
        Self::select(&conn, kind, &query.where_sql(), &query.args)
    }

    fn list_matches(&self, column: &str, id: i64) -> Result<Vec<Match>> {
        let conn = acquire_lock(&self.conn);
        let other = if column == "postings_id" {
            "sightings_id"
        } else {
            "postings_id"
        };
        let sql = format!(
            "SELECT postings_id, sightings_id, last_contacted FROM matches
             WHERE {column} = ?1 ORDER BY {other}"
        );
        let mut stmt = conn.prepare(&sql).map_err(op_error("prepare_matches"))?;
        let rows = stmt
            .query_map([id], match_from_row)
            .map_err(op_error("query_matches"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(op_error("read_matches"))
    }
}

impl RecordBackend for SqliteBackend {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Numbered
    }

    #[instrument(skip(self, posting), fields(operation = "insert_posting", backend = BACKEND))]
    fn insert_posting(&self, posting: &Posting) -> Result<Posting> {
        let start = Instant::now();
        let result = self
            .insert_report(RecordKind::Posting, &posting.report, false)
            .map(|(report, _)| Posting::new(report));
        record_operation_metrics(BACKEND, "insert_posting", start, status_of(&result));
        result
    }

    #[instrument(skip(self, sighting), fields(operation = "insert_sighting", backend = BACKEND))]
    fn insert_sighting(&self, sighting: &Sighting) -> Result<Sighting> {
        let start = Instant::now();
        let result = self
            .insert_report(RecordKind::Sighting, &sighting.report, sighting.in_custody)
            .map(|(report, in_custody)| Sighting::new(report, in_custody));
        record_operation_metrics(BACKEND, "insert_sighting", start, status_of(&result));
        result
    }

    #[instrument(skip(self, query), fields(operation = "query_postings", backend = BACKEND, args = query.args.len()))]
    fn query_postings(&self, query: &CompiledQuery) -> Result<Vec<Posting>> {
        let start = Instant::now();
        let result = self.query_kind(RecordKind::Posting, query).map(|rows| {
            rows.into_iter()
                .map(|(report, _)| Posting::new(report))
                .collect()
        });
        record_operation_metrics(BACKEND, "query_postings", start, status_of(&result));
        result
    }

    #[instrument(skip(self, query), fields(operation = "query_sightings", backend = BACKEND, args = query.args.len()))]
    fn query_sightings(&self, query: &CompiledQuery) -> Result<Vec<Sighting>> {
        let start = Instant::now();
        let result = self.query_kind(RecordKind::Sighting, query).map(|rows| {
            rows.into_iter()
                .map(|(report, in_custody)| Sighting::new(report, in_custody))
                .collect()
        });
        record_operation_metrics(BACKEND, "query_sightings", start, status_of(&result));
        result
    }

    #[instrument(skip(self), fields(operation = "pet_types", backend = BACKEND))]
    fn pet_types(&self) -> Result<Vec<PetType>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare("SELECT id, name FROM types ORDER BY id ASC")
                .map_err(op_error("prepare_pet_types"))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(PetType {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })
                .map_err(op_error("query_pet_types"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(op_error("read_pet_types"))
        })();
        record_operation_metrics(BACKEND, "pet_types", start, status_of(&result));
        result
    }
}

impl MatchBackend for SqliteBackend {
    #[instrument(skip(self), fields(operation = "add_match", backend = BACKEND))]
    fn add_match(&self, posting_id: i64, sighting_id: i64) -> Result<bool> {
        let start = Instant::now();
        let result = acquire_lock(&self.conn)
            .execute(
                "INSERT OR IGNORE INTO matches (postings_id, sightings_id) VALUES (?1, ?2)",
                params![posting_id, sighting_id],
            )
            .map(|changed| changed > 0)
            .map_err(op_error("add_match"));
        record_operation_metrics(BACKEND, "add_match", start, status_of(&result));
        result
    }

    #[instrument(skip(self), fields(operation = "update_match", backend = BACKEND))]
    fn update_match(
        &self,
        posting_id: i64,
        sighting_id: i64,
        contacted_at: DateTime<Utc>,
    ) -> Result<bool> {
        let start = Instant::now();
        let result = acquire_lock(&self.conn)
            .execute(
                "UPDATE matches SET last_contacted = ?1 WHERE postings_id = ?2 AND sightings_id = ?3",
                params![format_timestamp(&contacted_at), posting_id, sighting_id],
            )
            .map(|changed| changed > 0)
            .map_err(op_error("update_match"));
        record_operation_metrics(BACKEND, "update_match", start, status_of(&result));
        result
    }

    #[instrument(skip(self), fields(operation = "remove_match", backend = BACKEND))]
    fn remove_match(&self, posting_id: i64, sighting_id: i64) -> Result<bool> {
        let start = Instant::now();
        let result = acquire_lock(&self.conn)
            .execute(
                "DELETE FROM matches WHERE postings_id = ?1 AND sightings_id = ?2",
                params![posting_id, sighting_id],
            )
            .map(|changed| changed > 0)
            .map_err(op_error("remove_match"));
        record_operation_metrics(BACKEND, "remove_match", start, status_of(&result));
        result
    }

    #[instrument(skip(self), fields(operation = "matches_for_posting", backend = BACKEND))]
    fn matches_for_posting(&self, posting_id: i64) -> Result<Vec<Match>> {
        let start = Instant::now();
        let result = self.list_matches("postings_id", posting_id);
        record_operation_metrics(BACKEND, "matches_for_posting", start, status_of(&result));
        result
    }

    #[instrument(skip(self), fields(operation = "matches_for_sighting", backend = BACKEND))]
    fn matches_for_sighting(&self, sighting_id: i64) -> Result<Vec<Match>> {
        let start = Instant::now();
        let result = self.list_matches("sightings_id", sighting_id);
        record_operation_metrics(BACKEND, "matches_for_sighting", start, status_of(&result));
        result
    }
}
