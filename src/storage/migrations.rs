//! Embedded PostgreSQL schema migrations.
//!
//! Migrations are compiled in and applied in version order on startup. Each
//! one runs in its own transaction together with the row recording it in
//! `lostpets_schema_migrations`.

/// A single versioned migration.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Version, sequential from 1.
    pub version: i32,
    /// Human-readable description.
    pub description: &'static str,
    /// Statements separated by semicolons.
    pub sql: &'static str,
}

/// Registry schema.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Registry tables",
        sql: r"
            CREATE TABLE IF NOT EXISTS types (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS pets (
                id BIGSERIAL PRIMARY KEY,
                picture_id BIGINT,
                type_id BIGINT REFERENCES types(id),
                name TEXT NOT NULL DEFAULT '',
                color TEXT NOT NULL DEFAULT '',
                marks TEXT NOT NULL DEFAULT ''
            );
            CREATE TABLE IF NOT EXISTS pet_breeds (
                id BIGSERIAL PRIMARY KEY,
                pet_id BIGINT NOT NULL REFERENCES pets(id) ON DELETE CASCADE,
                name TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tags (
                id BIGSERIAL PRIMARY KEY,
                pet_id BIGINT NOT NULL REFERENCES pets(id) ON DELETE CASCADE,
                shape TEXT NOT NULL DEFAULT '',
                text TEXT NOT NULL DEFAULT '',
                color TEXT NOT NULL DEFAULT ''
            );
            CREATE TABLE IF NOT EXISTS postings (
                id BIGSERIAL PRIMARY KEY,
                guid TEXT NOT NULL UNIQUE,
                pet_id BIGINT NOT NULL REFERENCES pets(id),
                date TIMESTAMPTZ NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL DEFAULT ''
            );
            CREATE TABLE IF NOT EXISTS sightings (
                id BIGSERIAL PRIMARY KEY,
                guid TEXT NOT NULL UNIQUE,
                pet_id BIGINT NOT NULL REFERENCES pets(id),
                date TIMESTAMPTZ NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL DEFAULT '',
                in_custody BOOLEAN NOT NULL DEFAULT FALSE
            );
            CREATE INDEX IF NOT EXISTS idx_pet_breeds_pet ON pet_breeds (pet_id);
            CREATE INDEX IF NOT EXISTS idx_tags_pet ON tags (pet_id)
        ",
    },
    Migration {
        version: 2,
        description: "Matches table",
        sql: r"
            CREATE TABLE IF NOT EXISTS matches (
                postings_id BIGINT NOT NULL REFERENCES postings(id) ON DELETE CASCADE,
                sightings_id BIGINT NOT NULL REFERENCES sightings(id) ON DELETE CASCADE,
                last_contacted TIMESTAMPTZ,
                PRIMARY KEY (postings_id, sightings_id)
            );
            CREATE INDEX IF NOT EXISTS idx_matches_sighting ON matches (sightings_id)
        ",
    },
    Migration {
        version: 3,
        description: "Seed pet types",
        sql: r"
            INSERT INTO types (name) VALUES ('Dog'), ('Cat'), ('Other')
            ON CONFLICT (name) DO NOTHING
        ",
    },
];

/// Maximum version across a set of migrations.
#[must_use]
pub fn max_version(migrations: &[Migration]) -> i32 {
    migrations.iter().map(|m| m.version).max().unwrap_or(0)
}

#[cfg(feature = "postgres")]
mod runner {
    use super::Migration;
    use crate::{Error, Result};
    use deadpool_postgres::Pool;

    const MIGRATIONS_TABLE: &str = "lostpets_schema_migrations";

    /// Applies pending migrations through a connection pool.
    pub struct MigrationRunner {
        pool: Pool,
    }

    impl MigrationRunner {
        /// Creates a runner.
        #[must_use]
        pub const fn new(pool: Pool) -> Self {
            Self { pool }
        }

        /// Applies every migration newer than the recorded version.
        ///
        /// # Errors
        ///
        /// Returns an error if a connection cannot be acquired or a
        /// migration fails; a failed migration is rolled back.
        pub async fn run(&self, migrations: &[Migration]) -> Result<()> {
            let mut client = self.pool.get().await.map_err(|e| Error::OperationFailed {
                operation: "migration_get_connection".to_string(),
                cause: e.to_string(),
            })?;

            client
                .execute(
                    &format!(
                        "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
                            version INTEGER PRIMARY KEY,
                            description TEXT NOT NULL,
                            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                        )"
                    ),
                    &[],
                )
                .await
                .map_err(|e| Error::OperationFailed {
                    operation: "create_migrations_table".to_string(),
                    cause: e.to_string(),
                })?;

            let current: i32 = client
                .query_one(
                    &format!("SELECT COALESCE(MAX(version), 0) FROM {MIGRATIONS_TABLE}"),
                    &[],
                )
                .await
                .map(|row| row.get(0))
                .map_err(|e| Error::OperationFailed {
                    operation: "read_schema_version".to_string(),
                    cause: e.to_string(),
                })?;

            for migration in migrations.iter().filter(|m| m.version > current) {
                Self::apply(&mut client, migration).await?;
            }
            Ok(())
        }

        async fn apply(client: &mut deadpool_postgres::Object, migration: &Migration) -> Result<()> {
            let failed = |stage: &str, e: tokio_postgres::Error| Error::OperationFailed {
                operation: format!("migration_v{}_{stage}", migration.version),
                cause: e.to_string(),
            };

            let tx = client.transaction().await.map_err(|e| failed("begin", e))?;
            for statement in migration.sql.split(';').map(str::trim) {
                if statement.is_empty() {
                    continue;
                }
                tx.execute(statement, &[])
                    .await
                    .map_err(|e| failed("apply", e))?;
            }
            tx.execute(
                &format!("INSERT INTO {MIGRATIONS_TABLE} (version, description) VALUES ($1, $2)"),
                &[&migration.version, &migration.description],
            )
            .await
            .map_err(|e| failed("record", e))?;
            tx.commit().await.map_err(|e| failed("commit", e))?;

            tracing::info!(
                version = migration.version,
                description = migration.description,
                "Applied migration"
            );
            Ok(())
        }
    }
}

#[cfg(feature = "postgres")]
pub use runner::MigrationRunner;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(usize::try_from(migration.version).unwrap(), i + 1);
        }
        assert_eq!(max_version(MIGRATIONS), 3);
        assert_eq!(max_version(&[]), 0);
    }

    #[test]
    fn test_matches_pair_is_unique() {
        let sql = MIGRATIONS[1].sql;
        assert!(sql.contains("PRIMARY KEY (postings_id, sightings_id)"));
    }
}
