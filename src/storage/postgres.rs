//! PostgreSQL record and match backend.
//!
//! Synchronous trait calls are bridged onto the async pool with
//! a blocking helper; callers inside a runtime must be on a
//! multi-threaded runtime or a blocking thread.

#[cfg(feature = "postgres")]
mod implementation {
    use crate::models::{Match, Pet, PetType, Posting, RecordKind, Report, Sighting, Tag};
    use crate::query::{CompiledQuery, PlaceholderStyle, SqlParam};
    use crate::storage::migrations::{MIGRATIONS, MigrationRunner};
    use crate::storage::sqlite::{record_operation_metrics, status_of};
    use crate::storage::traits::{MatchBackend, RecordBackend};
    use crate::{Error, Result};
    use chrono::{DateTime, Utc};
    use deadpool_postgres::{Config, Pool, Runtime};
    use tokio::runtime::Handle;
    use tokio_postgres::NoTls;
    use tokio_postgres::types::ToSql;
    use tracing::instrument;

    const BACKEND: &str = "postgresql";

    type BoxedParam = Box<dyn ToSql + Sync + Send>;

    fn pool_error(e: impl std::fmt::Display) -> Error {
        Error::OperationFailed {
            operation: "postgres_get_client".to_string(),
            cause: e.to_string(),
        }
    }

    fn query_error(op: &str, e: impl std::fmt::Display) -> Error {
        Error::OperationFailed {
            operation: op.to_string(),
            cause: e.to_string(),
        }
    }

    fn boxed(param: &SqlParam) -> BoxedParam {
        match param {
            SqlParam::Null => Box::new(None::<String>),
            SqlParam::Text(s) => Box::new(s.clone()),
            SqlParam::Integer(i) => Box::new(*i),
            SqlParam::Timestamp(ts) => Box::new(*ts),
        }
    }

    fn select_sql(kind: RecordKind, where_sql: &str) -> String {
        let table = kind.plural();
        let extra = match kind {
            RecordKind::Posting => "",
            RecordKind::Sighting => ", sightings.in_custody",
        };
        format!(
            "SELECT {table}.id, {table}.guid, {table}.date, {table}.location, {table}.name, {table}.email,
                pets.id, pets.picture_id, pets.name, pets.color, pets.marks,
                types.id, types.name, tags.id, tags.shape, tags.color, tags.text,
                array_remove(array_agg(DISTINCT pet_breeds.name), NULL){extra}
            FROM {table}
            LEFT JOIN pets ON pets.id = {table}.pet_id
            LEFT JOIN types ON types.id = pets.type_id
            LEFT JOIN pet_breeds ON pet_breeds.pet_id = pets.id
            LEFT JOIN tags ON tags.pet_id = pets.id{where_sql}
            GROUP BY {table}.id, pets.id, types.id, tags.id
            ORDER BY {table}.id"
        )
    }

    fn report_from_row(row: &tokio_postgres::Row) -> Report {
        Report {
            id: row.get(0),
            guid: row.get(1),
            date: row.get(2),
            location: row.get(3),
            name: row.get(4),
            email: row.get(5),
            pet: Pet {
                id: row.get::<_, Option<i64>>(6).unwrap_or_default(),
                picture_id: row.get(7),
                name: row.get::<_, Option<String>>(8).unwrap_or_default(),
                color: row.get::<_, Option<String>>(9).unwrap_or_default(),
                marks: row.get::<_, Option<String>>(10).unwrap_or_default(),
                type_id: row.get::<_, Option<i64>>(11).unwrap_or_default(),
                type_name: row.get::<_, Option<String>>(12).unwrap_or_default(),
                tag: Tag {
                    id: row.get::<_, Option<i64>>(13).unwrap_or_default(),
                    shape: row.get::<_, Option<String>>(14).unwrap_or_default(),
                    color: row.get::<_, Option<String>>(15).unwrap_or_default(),
                    text: row.get::<_, Option<String>>(16).unwrap_or_default(),
                },
                breeds: row.get::<_, Option<Vec<String>>>(17).unwrap_or_default(),
            },
        }
    }

    fn match_from_row(row: &tokio_postgres::Row) -> Match {
        Match {
            posting_id: row.get(0),
            sighting_id: row.get(1),
            last_contacted: row.get(2),
        }
    }

    /// PostgreSQL-backed registry store.
    pub struct PostgresBackend {
        pool: Pool,
    }

    impl PostgresBackend {
        /// Default maximum connections in pool.
        const DEFAULT_POOL_MAX_SIZE: usize = 20;

        /// Connects and applies pending migrations.
        ///
        /// # Errors
        ///
        /// Returns an error if the URL is invalid, the pool cannot be built
        /// or a migration fails.
        pub fn new(connection_url: &str, pool_max_size: Option<usize>) -> Result<Self> {
            let config = connection_url
                .parse::<tokio_postgres::Config>()
                .map_err(|e| query_error("postgres_parse_url", e))?;
            let cfg = Self::build_pool_config(&config, pool_max_size);
            let pool = cfg
                .create_pool(Some(Runtime::Tokio1), NoTls)
                .map_err(|e| query_error("postgres_create_pool", e))?;

            let backend = Self { pool };
            backend.block_on(async {
                MigrationRunner::new(backend.pool.clone())
                    .run(MIGRATIONS)
                    .await
            })?;
            Ok(backend)
        }

        fn build_pool_config(config: &tokio_postgres::Config, pool_max_size: Option<usize>) -> Config {
            let mut cfg = Config::new();
            cfg.host = config.get_hosts().first().map(|h| match h {
                tokio_postgres::config::Host::Tcp(s) => s.clone(),
                #[cfg(unix)]
                tokio_postgres::config::Host::Unix(p) => p.to_string_lossy().to_string(),
            });
            cfg.port = config.get_ports().first().copied();
            cfg.user = config.get_user().map(String::from);
            cfg.password = config
                .get_password()
                .map(|p| String::from_utf8_lossy(p).to_string());
            cfg.dbname = config.get_dbname().map(String::from);

            cfg.pool = Some(deadpool_postgres::PoolConfig {
                max_size: pool_max_size.unwrap_or(Self::DEFAULT_POOL_MAX_SIZE),
                timeouts: deadpool_postgres::Timeouts {
                    wait: Some(std::time::Duration::from_secs(5)),
                    create: Some(std::time::Duration::from_secs(5)),
                    recycle: Some(std::time::Duration::from_secs(5)),
                },
                ..Default::default()
            });
            cfg.manager = Some(deadpool_postgres::ManagerConfig {
                recycling_method: deadpool_postgres::RecyclingMethod::Fast,
            });
            cfg
        }

        /// Runs a future to completion from synchronous code.
        fn block_on<F, T>(&self, f: F) -> Result<T>
        where
            F: std::future::Future<Output = Result<T>>,
        {
            if let Ok(handle) = Handle::try_current() {
                tokio::task::block_in_place(|| handle.block_on(f))
            } else {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| query_error("postgres_create_runtime", e))?;
                rt.block_on(f)
            }
        }

        async fn insert_report_async(
            &self,
            kind: RecordKind,
            report: &Report,
            in_custody: bool,
        ) -> Result<(Report, bool)> {
            let mut client = self.pool.get().await.map_err(pool_error)?;
            let tx = client
                .transaction()
                .await
                .map_err(|e| query_error("begin_transaction", e))?;

            let pet = &report.pet;
            let type_id: Option<i64> = if pet.type_id > 0 {
                Some(pet.type_id)
            } else if pet.type_name.is_empty() {
                None
            } else {
                let row = tx
                    .query_opt(
                        "SELECT id FROM types WHERE lower(name) = lower($1)",
                        &[&pet.type_name],
                    )
                    .await
                    .map_err(|e| query_error("resolve_pet_type", e))?
                    .ok_or_else(|| {
                        Error::InvalidInput(format!("unknown pet type '{}'", pet.type_name))
                    })?;
                Some(row.get(0))
            };

            let pet_id: i64 = tx
                .query_one(
                    "INSERT INTO pets (picture_id, type_id, name, color, marks)
                     VALUES ($1, $2, $3, $4, $5) RETURNING id",
                    &[&pet.picture_id, &type_id, &pet.name, &pet.color, &pet.marks],
                )
                .await
                .map(|row| row.get(0))
                .map_err(|e| query_error("insert_pet", e))?;

            for breed in pet.breeds.iter().filter(|b| !b.is_empty()) {
                tx.execute(
                    "INSERT INTO pet_breeds (pet_id, name) VALUES ($1, $2)",
                    &[&pet_id, breed],
                )
                .await
                .map_err(|e| query_error("insert_breed", e))?;
            }
            tx.execute(
                "INSERT INTO tags (pet_id, shape, text, color) VALUES ($1, $2, $3, $4)",
                &[&pet_id, &pet.tag.shape, &pet.tag.text, &pet.tag.color],
            )
            .await
            .map_err(|e| query_error("insert_tag", e))?;

            let guid = uuid::Uuid::new_v4().to_string();
            let id: i64 = match kind {
                RecordKind::Posting => {
                    tx.query_one(
                        "INSERT INTO postings (guid, pet_id, date, location, name, email)
                         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
                        &[
                            &guid,
                            &pet_id,
                            &report.date,
                            &report.location,
                            &report.name,
                            &report.email,
                        ],
                    )
                    .await
                },
                RecordKind::Sighting => {
                    tx.query_one(
                        "INSERT INTO sightings (guid, pet_id, date, location, name, email, in_custody)
                         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
                        &[
                            &guid,
                            &pet_id,
                            &report.date,
                            &report.location,
                            &report.name,
                            &report.email,
                            &in_custody,
                        ],
                    )
                    .await
                },
            }
            .map(|row| row.get(0))
            .map_err(|e| query_error("insert_record", e))?;

            let sql = select_sql(kind, &format!(" WHERE {}.id = $1", kind.plural()));
            let row = tx
                .query_one(&sql, &[&id])
                .await
                .map_err(|e| query_error("read_inserted_record", e))?;
            let stored = Self::decode(kind, &row);

            tx.commit()
                .await
                .map_err(|e| query_error("commit_transaction", e))?;
            Ok(stored)
        }

        fn decode(kind: RecordKind, row: &tokio_postgres::Row) -> (Report, bool) {
            let in_custody = match kind {
                RecordKind::Posting => false,
                RecordKind::Sighting => row.get(18),
            };
            (report_from_row(row), in_custody)
        }

        async fn query_async(
            &self,
            kind: RecordKind,
            query: &CompiledQuery,
        ) -> Result<Vec<(Report, bool)>> {
            let client = self.pool.get().await.map_err(pool_error)?;
            let params: Vec<BoxedParam> = query.args.iter().map(boxed).collect();
            let param_refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();

            let sql = select_sql(kind, &query.where_sql());
            let rows = client
                .query(&sql, &param_refs)
                .await
                .map_err(|e| query_error("query_records", e))?;
            Ok(rows.iter().map(|row| Self::decode(kind, row)).collect())
        }

        async fn execute_async(
            &self,
            operation: &str,
            sql: &str,
            params: &[&(dyn ToSql + Sync)],
        ) -> Result<u64> {
            let client = self.pool.get().await.map_err(pool_error)?;
            client
                .execute(sql, params)
                .await
                .map_err(|e| query_error(operation, e))
        }

        async fn matches_async(&self, column: &str, id: i64) -> Result<Vec<Match>> {
            let other = if column == "postings_id" {
                "sightings_id"
            } else {
                "postings_id"
            };
            let client = self.pool.get().await.map_err(pool_error)?;
            let rows = client
                .query(
                    &format!(
                        "SELECT postings_id, sightings_id, last_contacted FROM matches
                         WHERE {column} = $1 ORDER BY {other}"
                    ),
                    &[&id],
                )
                .await
                .map_err(|e| query_error("query_matches", e))?;
            Ok(rows.iter().map(match_from_row).collect())
        }
    }

    impl RecordBackend for PostgresBackend {
        fn placeholder_style(&self) -> PlaceholderStyle {
            PlaceholderStyle::Dollar
        }

        #[instrument(skip(self, posting), fields(operation = "insert_posting", backend = BACKEND))]
        fn insert_posting(&self, posting: &Posting) -> Result<Posting> {
            let start = std::time::Instant::now();
            let result = self
                .block_on(self.insert_report_async(RecordKind::Posting, &posting.report, false))
                .map(|(report, _)| Posting::new(report));
            record_operation_metrics(BACKEND, "insert_posting", start, status_of(&result));
            result
        }

        #[instrument(skip(self, sighting), fields(operation = "insert_sighting", backend = BACKEND))]
        fn insert_sighting(&self, sighting: &Sighting) -> Result<Sighting> {
            let start = std::time::Instant::now();
            let result = self
                .block_on(self.insert_report_async(
                    RecordKind::Sighting,
                    &sighting.report,
                    sighting.in_custody,
                ))
                .map(|(report, in_custody)| Sighting::new(report, in_custody));
            record_operation_metrics(BACKEND, "insert_sighting", start, status_of(&result));
            result
        }

        #[instrument(skip(self, query), fields(operation = "query_postings", backend = BACKEND, args = query.args.len()))]
        fn query_postings(&self, query: &CompiledQuery) -> Result<Vec<Posting>> {
            let start = std::time::Instant::now();
            let result = self
                .block_on(self.query_async(RecordKind::Posting, query))
                .map(|rows| rows.into_iter().map(|(r, _)| Posting::new(r)).collect());
            record_operation_metrics(BACKEND, "query_postings", start, status_of(&result));
            result
        }

        #[instrument(skip(self, query), fields(operation = "query_sightings", backend = BACKEND, args = query.args.len()))]
        fn query_sightings(&self, query: &CompiledQuery) -> Result<Vec<Sighting>> {
            let start = std::time::Instant::now();
            let result = self
                .block_on(self.query_async(RecordKind::Sighting, query))
                .map(|rows| rows.into_iter().map(|(r, c)| Sighting::new(r, c)).collect());
            record_operation_metrics(BACKEND, "query_sightings", start, status_of(&result));
            result
        }

        #[instrument(skip(self), fields(operation = "pet_types", backend = BACKEND))]
        fn pet_types(&self) -> Result<Vec<PetType>> {
            let start = std::time::Instant::now();
            let result = self.block_on(async {
                let client = self.pool.get().await.map_err(pool_error)?;
                let rows = client
                    .query("SELECT id, name FROM types ORDER BY id ASC", &[])
                    .await
                    .map_err(|e| query_error("query_pet_types", e))?;
                Ok(rows
                    .iter()
                    .map(|row| PetType {
                        id: row.get(0),
                        name: row.get(1),
                    })
                    .collect())
            });
            record_operation_metrics(BACKEND, "pet_types", start, status_of(&result));
            result
        }
    }

    impl MatchBackend for PostgresBackend {
        #[instrument(skip(self), fields(operation = "add_match", backend = BACKEND))]
        fn add_match(&self, posting_id: i64, sighting_id: i64) -> Result<bool> {
            let start = std::time::Instant::now();
            let result = self
                .block_on(self.execute_async(
                    "add_match",
                    "INSERT INTO matches (postings_id, sightings_id) VALUES ($1, $2)
                     ON CONFLICT DO NOTHING",
                    &[&posting_id, &sighting_id],
                ))
                .map(|changed| changed > 0);
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
            let start = std::time::Instant::now();
            let result = self
                .block_on(self.execute_async(
                    "update_match",
                    "UPDATE matches SET last_contacted = $1
                     WHERE postings_id = $2 AND sightings_id = $3",
                    &[&contacted_at, &posting_id, &sighting_id],
                ))
                .map(|changed| changed > 0);
            record_operation_metrics(BACKEND, "update_match", start, status_of(&result));
            result
        }

        #[instrument(skip(self), fields(operation = "remove_match", backend = BACKEND))]
        fn remove_match(&self, posting_id: i64, sighting_id: i64) -> Result<bool> {
            let start = std::time::Instant::now();
            let result = self
                .block_on(self.execute_async(
                    "remove_match",
                    "DELETE FROM matches WHERE postings_id = $1 AND sightings_id = $2",
                    &[&posting_id, &sighting_id],
                ))
                .map(|changed| changed > 0);
            record_operation_metrics(BACKEND, "remove_match", start, status_of(&result));
            result
        }

        #[instrument(skip(self), fields(operation = "matches_for_posting", backend = BACKEND))]
        fn matches_for_posting(&self, posting_id: i64) -> Result<Vec<Match>> {
            let start = std::time::Instant::now();
            let result = self.block_on(self.matches_async("postings_id", posting_id));
            record_operation_metrics(BACKEND, "matches_for_posting", start, status_of(&result));
            result
        }

        #[instrument(skip(self), fields(operation = "matches_for_sighting", backend = BACKEND))]
        fn matches_for_sighting(&self, sighting_id: i64) -> Result<Vec<Match>> {
            let start = std::time::Instant::now();
            let result = self.block_on(self.matches_async("sightings_id", sighting_id));
            record_operation_metrics(BACKEND, "matches_for_sighting", start, status_of(&result));
            result
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_select_aggregates_breeds() {
            let sql = select_sql(RecordKind::Posting, " WHERE (lower(pets.color) like $1)");
            assert!(sql.contains("array_remove(array_agg(DISTINCT pet_breeds.name), NULL)"));
            assert!(sql.contains("tags.pet_id = pets.id WHERE (lower(pets.color) like $1)"));
            assert!(!sql.contains("in_custody"));
        }

        #[test]
        fn test_params_box_every_variant() {
            let params: Vec<BoxedParam> = [
                SqlParam::Null,
                SqlParam::Text("a".into()),
                SqlParam::Integer(1),
                SqlParam::Timestamp(Utc::now()),
            ]
            .iter()
            .map(boxed)
            .collect();
            assert_eq!(params.len(), 4);
        }
    }
}

#[cfg(feature = "postgres")]
pub use implementation::PostgresBackend;
