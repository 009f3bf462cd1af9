//! Backend factory.
//!
//! Turns configuration into the storage backend and notifier the services
//! run on.

use crate::config::{BackendKind, DatabaseConfig, EmailConfig};
use crate::notify::{LogNotifier, Notifier, SmtpNotifier};
use crate::storage::{RegistryStore, SqliteBackend};
use crate::{Error, Result};
use std::sync::Arc;

/// Factory for creating storage backends and notifiers.
pub struct BackendFactory;

impl BackendFactory {
    /// Opens the configured store, creating the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened, or
    /// [`Error::InvalidInput`] if PostgreSQL is selected without the
    /// `postgres` feature or without a URL.
    pub fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn RegistryStore>> {
        match config.backend {
            BackendKind::Sqlite => {
                let path = config.sqlite_path();
                tracing::debug!(path = %path.display(), "Opening SQLite store");
                Ok(Arc::new(SqliteBackend::new(path)?))
            },
            BackendKind::Postgres => Self::open_postgres(config),
        }
    }

    #[cfg(feature = "postgres")]
    fn open_postgres(config: &DatabaseConfig) -> Result<Arc<dyn RegistryStore>> {
        let url = config.url.as_deref().ok_or_else(|| {
            Error::InvalidInput("database.url is required for the postgres backend".to_string())
        })?;
        Ok(Arc::new(crate::storage::PostgresBackend::new(
            url,
            config.pool_size,
        )?))
    }

    #[cfg(not(feature = "postgres"))]
    fn open_postgres(_config: &DatabaseConfig) -> Result<Arc<dyn RegistryStore>> {
        Err(Error::InvalidInput(
            "postgres backend requires building with the 'postgres' feature".to_string(),
        ))
    }

    /// Creates the notifier: SMTP when a host is configured, log-only
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if SMTP is configured but cannot be set up.
    pub fn notifier(config: &EmailConfig) -> Result<Arc<dyn Notifier>> {
        if config.is_enabled() {
            Ok(Arc::new(SmtpNotifier::from_config(config)?))
        } else {
            tracing::debug!("SMTP not configured, notifications go to the log");
            Ok(Arc::new(LogNotifier::new(config.link_base.clone())))
        }
    }
}
