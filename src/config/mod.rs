//! Configuration management.
//!
//! Settings come from a TOML file, then `LOSTPETS_*` environment variables
//! override individual values:
//!
//! ```toml
//! [database]
//! backend = "sqlite"
//! path = "/var/lib/lostpets/registry.db"
//!
//! [matching]
//! workers = 2
//! queue_capacity = 64
//!
//! [email]
//! host = "smtp.example.com"
//! port = 587
//! user = "registry@example.com"
//! password = "hunter2"
//! link_base = "https://lostpets.example.com/private/"
//!
//! [fields.postings]
//! petname = "pets.name"
//! ```

mod email;

pub use email::EmailConfig;

use crate::query::FieldMap;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable pointing at a config file.
pub const CONFIG_PATH_ENV: &str = "LOSTPETS_CONFIG_PATH";

/// Main configuration for lostpets.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LostPetsConfig {
    /// Storage settings.
    pub database: DatabaseConfig,
    /// Background match search settings.
    pub matching: MatchingConfig,
    /// SMTP notification settings.
    pub email: EmailConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Metrics settings.
    pub metrics: MetricsConfig,
    /// Field-map overrides per record kind.
    pub fields: FieldsConfig,
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Embedded `SQLite` file.
    #[default]
    Sqlite,
    /// PostgreSQL server (requires the `postgres` feature).
    Postgres,
}

impl BackendKind {
    /// Parses a backend name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(Error::InvalidInput(format!("unknown backend '{other}'"))),
        }
    }
}

/// `[database]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Which backend to open.
    pub backend: BackendKind,
    /// `SQLite` file; defaults to the platform data dir.
    pub path: Option<PathBuf>,
    /// PostgreSQL connection URL.
    pub url: Option<String>,
    /// PostgreSQL pool size.
    pub pool_size: Option<usize>,
}

impl DatabaseConfig {
    /// Resolves the `SQLite` path, falling back to the platform data dir.
    #[must_use]
    pub fn sqlite_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        directories::ProjectDirs::from("", "", "lostpets").map_or_else(
            || PathBuf::from("lostpets.db"),
            |dirs| dirs.data_dir().join("lostpets.db"),
        )
    }
}

/// `[matching]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Number of worker tasks running searches.
    pub workers: usize,
    /// Jobs that may wait before new ones are rejected.
    pub queue_capacity: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `lostpets=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// `[metrics]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus exporter.
    pub enabled: bool,
    /// Listen port for the exporter.
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// `[fields.*]` sections: logical name to physical column.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FieldsConfig {
    /// Overrides applied to the postings map.
    pub postings: HashMap<String, String>,
    /// Overrides applied to the sightings map.
    pub sightings: HashMap<String, String>,
}

impl FieldsConfig {
    /// Built-in postings map with overrides applied.
    #[must_use]
    pub fn postings_map(&self) -> FieldMap {
        FieldMap::postings().with_overrides(&self.postings)
    }

    /// Built-in sightings map with overrides applied.
    #[must_use]
    pub fn sightings_map(&self) -> FieldMap {
        FieldMap::sightings().with_overrides(&self.sightings)
    }
}

impl LostPetsConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::parse(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the text is not valid config.
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::InvalidInput(format!("config: {e}")))
    }

    /// Loads configuration the way the binary does.
    ///
    /// Reads `.env` if present, then the first config file found among
    /// `explicit`, `$LOSTPETS_CONFIG_PATH` and the platform config dir, then
    /// applies environment overrides. A missing file yields defaults; an
    /// unreadable or malformed one is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be loaded, or an
    /// override has an invalid value.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        // A missing .env is normal.
        let _ = dotenvy::dotenv();

        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .or_else(default_config_path);

        let mut config = match path {
            Some(path) if path.exists() => Self::load_from_file(&path)?,
            Some(path) if explicit.is_some() => {
                return Err(Error::NotFound(format!(
                    "config file {}",
                    path.display()
                )));
            },
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `LOSTPETS_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a numeric override does not parse.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("LOSTPETS_DB_BACKEND") {
            self.database.backend = BackendKind::parse(&v)?;
        }
        if let Some(v) = lookup("LOSTPETS_DB_PATH") {
            self.database.path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("LOSTPETS_DB_URL") {
            self.database.url = Some(v);
        }
        if let Some(v) = lookup("LOSTPETS_DB_POOL_SIZE") {
            self.database.pool_size = Some(parse_number("LOSTPETS_DB_POOL_SIZE", &v)?);
        }
        if let Some(v) = lookup("LOSTPETS_MATCH_WORKERS") {
            self.matching.workers = parse_number("LOSTPETS_MATCH_WORKERS", &v)?;
        }
        if let Some(v) = lookup("LOSTPETS_MATCH_QUEUE_CAPACITY") {
            self.matching.queue_capacity = parse_number("LOSTPETS_MATCH_QUEUE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("LOSTPETS_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("LOSTPETS_LOG_FORMAT") {
            self.logging.format = LogFormat::parse(&v);
        }
        if let Some(v) = lookup("LOSTPETS_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("LOSTPETS_METRICS_ENABLED") {
            self.metrics.enabled = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("LOSTPETS_METRICS_PORT") {
            self.metrics.port = parse_number("LOSTPETS_METRICS_PORT", &v)?;
        }
        self.email.apply_env(&lookup)
    }

    /// Checks values that would make the service unusable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.matching.workers == 0 {
            return Err(Error::InvalidInput(
                "matching.workers must be at least 1".to_string(),
            ));
        }
        if self.matching.queue_capacity == 0 {
            return Err(Error::InvalidInput(
                "matching.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.database.backend == BackendKind::Postgres && self.database.url.is_none() {
            return Err(Error::InvalidInput(
                "database.url is required for the postgres backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the `SQLite` path.
    #[must_use]
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database.path = Some(path.into());
        self
    }

    /// Sets the worker count and queue capacity.
    #[must_use]
    pub const fn with_matching(mut self, workers: usize, queue_capacity: usize) -> Self {
        self.matching.workers = workers;
        self.matching.queue_capacity = queue_capacity;
        self
    }
}

fn default_config_path() -> Option<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "lostpets")?;
    Some(dirs.config_dir().join("config.toml"))
}

pub(crate) fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("{key}: '{value}' is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LostPetsConfig::new();
        assert_eq!(config.database.backend, BackendKind::Sqlite);
        assert_eq!(config.matching.workers, 2);
        assert_eq!(config.matching.queue_capacity, 64);
        assert_eq!(config.logging.level, "info");
        assert!(!config.metrics.enabled);
        assert!(!config.email.is_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_file() {
        let config = LostPetsConfig::parse(
            r#"
            [database]
            backend = "postgres"
            url = "postgres://localhost/lostpets"
            pool_size = 4

            [matching]
            workers = 3
            queue_capacity = 10

            [email]
            host = "smtp.example.com"
            user = "registry@example.com"
            password = "s3cret"
            link_base = "https://lostpets.example/p/"

            [logging]
            level = "debug"
            format = "json"

            [fields.postings]
            petname = "pets.nickname"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.backend, BackendKind::Postgres);
        assert_eq!(config.database.pool_size, Some(4));
        assert_eq!(config.matching.workers, 3);
        assert_eq!(config.email.port, 587);
        assert!(config.email.is_enabled());
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.fields.postings_map().physical("petname"), "pets.nickname");
        assert_eq!(config.fields.sightings_map().physical("petname"), "pets.name");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_rejects_unknown_backend() {
        let err = LostPetsConfig::parse("[database]\nbackend = \"oracle\"").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[matching]\nworkers = 5").unwrap();

        let config = LostPetsConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.matching.workers, 5);
        assert_eq!(config.matching.queue_capacity, 64);
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = LostPetsConfig::load(Some(Path::new("/nonexistent/lostpets.toml"))).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = LostPetsConfig::new();
        config
            .apply_env(env(&[
                ("LOSTPETS_DB_PATH", "/tmp/pets.db"),
                ("LOSTPETS_MATCH_WORKERS", "4"),
                ("LOSTPETS_LOG_FORMAT", "JSON"),
                ("LOSTPETS_METRICS_ENABLED", "true"),
                ("LOSTPETS_SMTP_HOST", "mail.example.com"),
            ]))
            .unwrap();

        assert_eq!(config.database.sqlite_path(), PathBuf::from("/tmp/pets.db"));
        assert_eq!(config.matching.workers, 4);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.metrics.enabled);
        assert_eq!(config.email.host.as_deref(), Some("mail.example.com"));
    }

    #[test]
    fn test_env_override_bad_number() {
        let mut config = LostPetsConfig::new();
        let err = config
            .apply_env(env(&[("LOSTPETS_MATCH_QUEUE_CAPACITY", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("LOSTPETS_MATCH_QUEUE_CAPACITY"));
    }

    #[test]
    fn test_validate() {
        assert!(LostPetsConfig::new().with_matching(0, 8).validate().is_err());
        assert!(LostPetsConfig::new().with_matching(1, 0).validate().is_err());

        let mut config = LostPetsConfig::new();
        config.database.backend = BackendKind::Postgres;
        assert!(config.validate().is_err());
    }
}
