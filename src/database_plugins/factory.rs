// ABOUTME: Database factory selecting the backend from the connection string
// ABOUTME: Retries startup connections with exponential backoff and delegates every operation

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Database factory
//!
//! [`Database`] picks a backend from the connection string and forwards every
//! [`DataStore`] operation to it, so callers can stay backend-agnostic without
//! generics.

use super::shared::query_builder::{Statement, StatementBuilder};
use super::shared::transactions::backoff_delay;
use super::sqlite::{SqliteStore, SqliteTransaction};
use super::{DataStore, SqlSession, Transaction};
use crate::config::database::{DatabaseConfig, DatabaseUrl};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use rizon_core::models::{Index, Record, RelationRegistry};
use std::fmt::{self, Display};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[cfg(feature = "postgresql")]
use super::postgres::{PostgresStore, PostgresTransaction};

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    /// Embedded `SQLite`
    SQLite,
    /// `PostgreSQL` server
    PostgreSQL,
}

impl Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SQLite => "SQLite",
            Self::PostgreSQL => "PostgreSQL",
        })
    }
}

/// Detect the database type from a connection string
///
/// # Errors
///
/// Returns `ConfigInvalid` if the URL scheme is not recognized, or if it is
/// a `PostgreSQL` URL and the `postgresql` feature is not enabled
pub fn detect_database_type(database_url: &str) -> AppResult<DatabaseType> {
    database_type_of(&DatabaseUrl::parse_url(database_url)?)
}

fn database_type_of(url: &DatabaseUrl) -> AppResult<DatabaseType> {
    match url {
        DatabaseUrl::SQLite { .. } | DatabaseUrl::Memory => Ok(DatabaseType::SQLite),
        #[cfg(feature = "postgresql")]
        DatabaseUrl::PostgreSQL { .. } => Ok(DatabaseType::PostgreSQL),
        #[cfg(not(feature = "postgresql"))]
        DatabaseUrl::PostgreSQL { .. } => Err(AppError::config_invalid(
            "PostgreSQL connection string detected, but PostgreSQL support is not enabled. \
             Enable the 'postgresql' feature flag in Cargo.toml",
        )),
    }
}

/// Store selected at runtime
#[derive(Clone)]
pub enum Database {
    /// `SQLite` backend
    SQLite(SqliteStore),
    /// `PostgreSQL` backend
    #[cfg(feature = "postgresql")]
    PostgreSQL(PostgresStore),
}

impl Database {
    /// Connect with default settings
    ///
    /// # Errors
    ///
    /// See [`Database::from_config`]
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        Self::from_config(&DatabaseConfig::new(DatabaseUrl::parse_url(database_url)?)).await
    }

    /// Connect using [`DatabaseConfig::from_env`]
    ///
    /// # Errors
    ///
    /// See [`DatabaseConfig::from_env`] and [`Database::from_config`]
    pub async fn from_env() -> AppResult<Self> {
        Self::from_config(&DatabaseConfig::from_env()?).await
    }

    /// Connect, retrying transient failures with exponential backoff
    ///
    /// Configuration problems fail immediately. Connectivity failures are
    /// retried up to `pool.connection_retries` attempts in total, waiting
    /// `initial_retry_delay_ms`, doubling, capped at `max_retry_delay_ms`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for unusable configuration and `Connectivity`
    /// once every attempt has failed
    pub async fn from_config(config: &DatabaseConfig) -> AppResult<Self> {
        let db_type = database_type_of(&config.url)?;
        let attempts = config.pool.connection_retries.max(1);
        info!(
            backend = %db_type,
            url = %config.url,
            attempts,
            "Connecting to database"
        );

        let mut last_error = None;
        for attempt in 0..attempts {
            match Self::open(db_type, config).await {
                Ok(db) => {
                    if attempt > 0 {
                        info!("Database connection established after {} retries", attempt);
                    }
                    return Ok(db);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt + 1 < attempts {
                        let delay = Self::retry_delay(config, attempt);
                        warn!(
                            "Database connection attempt {}/{} failed, retrying in {}ms: {}",
                            attempt + 1,
                            attempts,
                            delay.as_millis(),
                            e
                        );
                        sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let message = format!(
            "Failed to connect to {} after {attempts} attempts: {}",
            config.url,
            last_error
                .as_ref()
                .map_or_else(|| "unknown error".to_owned(), ToString::to_string)
        );
        Err(match last_error {
            Some(source) => AppError::connectivity(message).with_source(source),
            None => AppError::connectivity(message),
        })
    }

    fn retry_delay(config: &DatabaseConfig, attempt: u32) -> Duration {
        backoff_delay(
            attempt,
            config.pool.initial_retry_delay_ms,
            config.pool.max_retry_delay_ms,
        )
    }

    async fn open(db_type: DatabaseType, config: &DatabaseConfig) -> AppResult<Self> {
        debug!(backend = %db_type, "Opening connection pool");
        match db_type {
            DatabaseType::SQLite => Ok(Self::SQLite(SqliteStore::from_config(config).await?)),
            #[cfg(feature = "postgresql")]
            DatabaseType::PostgreSQL => {
                Ok(Self::PostgreSQL(PostgresStore::from_config(config).await?))
            }
            #[cfg(not(feature = "postgresql"))]
            DatabaseType::PostgreSQL => Err(AppError::config_invalid(
                "PostgreSQL support not enabled. Enable the 'postgresql' feature flag.",
            )),
        }
    }

    /// Register the relations `QueryOption::relations` may name
    #[must_use]
    pub fn with_relations(self, relations: RelationRegistry) -> Self {
        match self {
            Self::SQLite(store) => Self::SQLite(store.with_relations(relations)),
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(store) => Self::PostgreSQL(store.with_relations(relations)),
        }
    }

    /// Get the database type enum
    #[must_use]
    pub const fn database_type(&self) -> DatabaseType {
        match self {
            Self::SQLite(_) => DatabaseType::SQLite,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(_) => DatabaseType::PostgreSQL,
        }
    }
}

#[async_trait]
impl SqlSession for Database {
    fn statements(&self) -> &StatementBuilder {
        match self {
            Self::SQLite(store) => store.statements(),
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(store) => store.statements(),
        }
    }

    fn session_backend(&self) -> &'static str {
        match self {
            Self::SQLite(store) => store.session_backend(),
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(store) => store.session_backend(),
        }
    }

    async fn fetch_all(&self, statement: Statement) -> AppResult<Vec<Record>> {
        match self {
            Self::SQLite(store) => store.fetch_all(statement).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(store) => store.fetch_all(statement).await,
        }
    }

    async fn fetch_optional(&self, statement: Statement) -> AppResult<Option<Record>> {
        match self {
            Self::SQLite(store) => store.fetch_optional(statement).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(store) => store.fetch_optional(statement).await,
        }
    }

    async fn execute(&self, statement: Statement) -> AppResult<u64> {
        match self {
            Self::SQLite(store) => store.execute(statement).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(store) => store.execute(statement).await,
        }
    }
}

#[async_trait]
impl DataStore for Database {
    type Tx = DatabaseTransaction;

    fn backend_name(&self) -> &'static str {
        match self {
            Self::SQLite(store) => store.backend_name(),
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(store) => store.backend_name(),
        }
    }

    async fn ping(&self) -> AppResult<()> {
        match self {
            Self::SQLite(store) => store.ping().await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(store) => store.ping().await,
        }
    }

    async fn close(&self) {
        match self {
            Self::SQLite(store) => store.close().await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(store) => store.close().await,
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            Self::SQLite(store) => store.is_closed(),
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(store) => store.is_closed(),
        }
    }

    async fn begin_tx(&self) -> AppResult<DatabaseTransaction> {
        match self {
            Self::SQLite(store) => Ok(DatabaseTransaction::SQLite(store.begin_tx().await?)),
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(store) => {
                Ok(DatabaseTransaction::PostgreSQL(store.begin_tx().await?))
            }
        }
    }

    async fn ensure_indices(&self, target: &str, indices: &[Index]) -> AppResult<()> {
        match self {
            Self::SQLite(store) => store.ensure_indices(target, indices).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(store) => store.ensure_indices(target, indices).await,
        }
    }

    async fn drop_indices(&self, target: &str, indices: &[Index]) -> AppResult<()> {
        match self {
            Self::SQLite(store) => store.drop_indices(target, indices).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(store) => store.drop_indices(target, indices).await,
        }
    }
}

/// Transaction handle issued by [`Database`]
pub enum DatabaseTransaction {
    /// `SQLite` transaction
    SQLite(SqliteTransaction),
    /// `PostgreSQL` transaction
    #[cfg(feature = "postgresql")]
    PostgreSQL(PostgresTransaction),
}

#[async_trait]
impl SqlSession for DatabaseTransaction {
    fn statements(&self) -> &StatementBuilder {
        match self {
            Self::SQLite(tx) => tx.statements(),
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(tx) => tx.statements(),
        }
    }

    fn session_backend(&self) -> &'static str {
        match self {
            Self::SQLite(tx) => tx.session_backend(),
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(tx) => tx.session_backend(),
        }
    }

    async fn fetch_all(&self, statement: Statement) -> AppResult<Vec<Record>> {
        match self {
            Self::SQLite(tx) => tx.fetch_all(statement).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(tx) => tx.fetch_all(statement).await,
        }
    }

    async fn fetch_optional(&self, statement: Statement) -> AppResult<Option<Record>> {
        match self {
            Self::SQLite(tx) => tx.fetch_optional(statement).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(tx) => tx.fetch_optional(statement).await,
        }
    }

    async fn execute(&self, statement: Statement) -> AppResult<u64> {
        match self {
            Self::SQLite(tx) => tx.execute(statement).await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(tx) => tx.execute(statement).await,
        }
    }
}

#[async_trait]
impl Transaction for DatabaseTransaction {
    async fn commit(self) -> AppResult<()> {
        match self {
            Self::SQLite(tx) => tx.commit().await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(tx) => tx.commit().await,
        }
    }

    async fn rollback(self) -> AppResult<()> {
        match self {
            Self::SQLite(tx) => tx.rollback().await,
            #[cfg(feature = "postgresql")]
            Self::PostgreSQL(tx) => tx.rollback().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_detect_database_type() {
        assert_eq!(
            detect_database_type("sqlite::memory:").unwrap(),
            DatabaseType::SQLite
        );
        assert_eq!(
            detect_database_type("sqlite:./data/app.db").unwrap(),
            DatabaseType::SQLite
        );
        assert_eq!(
            detect_database_type("mysql://localhost/app").unwrap_err().kind(),
            ErrorCode::ConfigInvalid
        );
    }

    #[cfg(not(feature = "postgresql"))]
    #[test]
    fn test_postgres_requires_feature() {
        let error = detect_database_type("postgres://localhost/app").unwrap_err();
        assert_eq!(error.kind(), ErrorCode::ConfigInvalid);
        assert!(error.message.contains("postgresql"));
    }

    #[tokio::test]
    async fn test_unopenable_sqlite_path_fails_without_retrying() {
        let mut config = DatabaseConfig::new(
            DatabaseUrl::parse_url("sqlite:/nonexistent-dir/nested/app.db").unwrap(),
        );
        config.pool.connection_retries = 3;
        config.pool.initial_retry_delay_ms = 0;
        assert!(Database::from_config(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_database_reports_backend() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        assert_eq!(db.database_type(), DatabaseType::SQLite);
        assert_eq!(db.backend_name(), "SQLite");
        db.ping().await.unwrap();
        db.close().await;
        assert!(db.is_closed());
        assert_eq!(db.ping().await.unwrap_err().kind(), ErrorCode::Connectivity);
    }
}
