// ABOUTME: Database configuration types for SQLite and PostgreSQL connections
// ABOUTME: Handles connection strings, pool sizing, startup retries, statement timeouts and SQLx settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::errors::{AppError, AppResult};
use rizon_core::constants::{database, env_config};
use serde::{Deserialize, Serialize};
use sqlx::pool::PoolOptions;
use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Type-safe database location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Path to `SQLite` database file
        path: PathBuf,
    },
    /// `PostgreSQL` connection
    PostgreSQL {
        /// `PostgreSQL` connection string
        connection_string: String,
    },
    /// In-memory `SQLite`
    Memory,
}

impl DatabaseUrl {
    /// Parse from string with validation
    ///
    /// Accepts `sqlite:<path>`, `sqlite://<path>`, `sqlite::memory:`,
    /// `postgres://...` and `postgresql://...`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for empty strings and unrecognized schemes
    pub fn parse_url(s: &str) -> AppResult<Self> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("sqlite:") {
            let path = rest.strip_prefix("//").unwrap_or(rest);
            match path {
                "" => Err(AppError::config_invalid("SQLite URL has no database path")),
                ":memory:" => Ok(Self::Memory),
                _ => Ok(Self::SQLite {
                    path: PathBuf::from(path),
                }),
            }
        } else if s.starts_with("postgresql://") || s.starts_with("postgres://") {
            Ok(Self::PostgreSQL {
                connection_string: s.to_owned(),
            })
        } else if s.is_empty() {
            Err(AppError::config_invalid("database URL is empty"))
        } else {
            let scheme = s.split_once(':').map_or(s, |(scheme, _)| scheme);
            Err(AppError::config_invalid(format!(
                "unsupported database URL scheme '{scheme}'; expected sqlite: or postgres://"
            )))
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::PostgreSQL { connection_string } => connection_string.clone(),
            Self::Memory => "sqlite::memory:".into(),
        }
    }

    /// Connection string with any password replaced, for logs
    #[must_use]
    pub fn redacted(&self) -> String {
        let Self::PostgreSQL { connection_string } = self else {
            return self.to_connection_string();
        };
        let Some((scheme, rest)) = connection_string.split_once("://") else {
            return connection_string.clone();
        };
        match rest.split_once('@') {
            Some((credentials, host)) => match credentials.split_once(':') {
                Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
                None => connection_string.clone(),
            },
            None => connection_string.clone(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }

    /// Check if this is a `SQLite` database
    #[must_use]
    pub const fn is_sqlite(&self) -> bool {
        matches!(self, Self::SQLite { .. } | Self::Memory)
    }

    /// Check if this is a `PostgreSQL` database
    #[must_use]
    pub const fn is_postgresql(&self) -> bool {
        matches!(self, Self::PostgreSQL { .. })
    }
}

impl FromStr for DatabaseUrl {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        Self::parse_url(s)
    }
}

impl Display for DatabaseUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.redacted())
    }
}

/// Everything needed to open a store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Where to connect
    pub url: DatabaseUrl,
    /// Deployment environment (`production`, `development`, ...)
    pub environment: String,
    /// Per-statement timeout in milliseconds; 0 disables it
    pub statement_timeout_ms: u64,
    /// Log every statement's SQL text and duration at debug level
    pub log_queries: bool,
    /// Connection pool sizing and startup retries
    pub pool: PoolConfig,
    /// Low-level `SQLx` pool settings
    pub sqlx: SqlxConfig,
}

impl DatabaseConfig {
    /// Configuration with defaults for everything but the URL
    #[must_use]
    pub fn new(url: DatabaseUrl) -> Self {
        Self {
            url,
            environment: "development".into(),
            statement_timeout_ms: database::DEFAULT_STATEMENT_TIMEOUT_MS,
            log_queries: true,
            pool: PoolConfig::default(),
            sqlx: SqlxConfig::default(),
        }
    }

    /// Load database configuration from environment
    ///
    /// The connection string comes from `SQL_DATABASE_URL`, falling back to
    /// `DATABASE_URL`. Query logging defaults to on outside `ENV=production`
    /// and can be forced with `DB_LOG_QUERIES`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigMissing` if neither URL variable is set, and
    /// `ConfigInvalid` if any variable fails to parse
    pub fn from_env() -> AppResult<Self> {
        let raw_url = env::var(env_config::SQL_DATABASE_URL)
            .or_else(|_| env::var(env_config::DATABASE_URL))
            .map_err(|_| {
                AppError::config_missing(format!(
                    "set {} (or {}) to a sqlite: or postgres:// URL",
                    env_config::SQL_DATABASE_URL,
                    env_config::DATABASE_URL
                ))
            })?;
        let environment = env_var_or(env_config::ENV, "development");
        let is_production = environment == "production";

        Ok(Self {
            url: DatabaseUrl::parse_url(&raw_url)?,
            statement_timeout_ms: parse_env(
                env_config::DB_STATEMENT_TIMEOUT_MS,
                database::DEFAULT_STATEMENT_TIMEOUT_MS,
            )?,
            log_queries: parse_env(env_config::DB_LOG_QUERIES, !is_production)?,
            pool: PoolConfig::from_env()?,
            sqlx: SqlxConfig::from_env(),
            environment,
        })
    }

    /// Whether this is a production deployment
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Statement timeout as a duration, `None` when disabled
    #[must_use]
    pub const fn statement_timeout(&self) -> Option<Duration> {
        if self.statement_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.statement_timeout_ms))
        }
    }

    /// Pool options for this configuration
    ///
    /// An in-memory `SQLite` database exists per connection, so the pool is
    /// pinned to a single connection that is never recycled.
    #[must_use]
    pub fn pool_options<DB: sqlx::Database>(&self) -> PoolOptions<DB> {
        let options = PoolOptions::<DB>::new()
            .acquire_timeout(Duration::from_secs(self.pool.acquire_timeout_secs))
            .test_before_acquire(self.sqlx.test_before_acquire);

        if self.url.is_memory() {
            return options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let mut options = options
            .max_connections(self.pool.max_connections)
            .min_connections(self.pool.min_connections.min(self.pool.max_connections));
        if let Some(secs) = self.sqlx.idle_timeout_secs {
            options = options.idle_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.sqlx.max_lifetime_secs {
            options = options.max_lifetime(Duration::from_secs(secs));
        }
        options
    }
}

/// Connection pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
    /// Number of connection attempts on startup
    pub connection_retries: u32,
    /// Initial retry delay in milliseconds (doubles with exponential backoff)
    pub initial_retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds
    pub max_retry_delay_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        // CI runners get a smaller pool
        let is_ci = env::var("CI").is_ok();
        Self {
            max_connections: if is_ci { 3 } else { database::DEFAULT_MAX_CONNECTIONS },
            min_connections: if is_ci { 1 } else { database::DEFAULT_MIN_CONNECTIONS },
            acquire_timeout_secs: database::DEFAULT_ACQUIRE_TIMEOUT_SECS,
            connection_retries: database::CONNECTION_RETRIES,
            initial_retry_delay_ms: database::INITIAL_RETRY_DELAY_MS,
            max_retry_delay_ms: database::MAX_RETRY_DELAY_MS,
        }
    }
}

impl PoolConfig {
    /// Load pool configuration from environment (or defaults)
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if a variable is set but not a number
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_connections: parse_env(env_config::DB_MAX_CONNECTIONS, defaults.max_connections)?,
            min_connections: parse_env(env_config::DB_MIN_CONNECTIONS, defaults.min_connections)?,
            acquire_timeout_secs: parse_env(
                env_config::DB_ACQUIRE_TIMEOUT,
                defaults.acquire_timeout_secs,
            )?,
            connection_retries: parse_env(
                env_config::DB_CONNECTION_RETRIES,
                defaults.connection_retries,
            )?,
            initial_retry_delay_ms: parse_env(
                env_config::DB_INITIAL_RETRY_DELAY_MS,
                defaults.initial_retry_delay_ms,
            )?,
            max_retry_delay_ms: parse_env(
                env_config::DB_MAX_RETRY_DELAY_MS,
                defaults.max_retry_delay_ms,
            )?,
        })
    }
}

/// `SQLx` connection pool configuration
///
/// Values of `None` use `SQLx` defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlxConfig {
    /// Maximum time a connection can sit idle before being closed (seconds)
    pub idle_timeout_secs: Option<u64>,
    /// Maximum lifetime of a connection before it's closed (seconds)
    pub max_lifetime_secs: Option<u64>,
    /// Whether to test connections before acquiring from pool
    pub test_before_acquire: bool,
    /// Prepared statement cache capacity per connection
    pub statement_cache_capacity: Option<usize>,
}

impl Default for SqlxConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: None,
            max_lifetime_secs: None,
            test_before_acquire: true,
            statement_cache_capacity: None,
        }
    }
}

impl SqlxConfig {
    /// Load from `SQLX_*` environment variables; unparsable values fall back to defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            idle_timeout_secs: env::var("SQLX_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            max_lifetime_secs: env::var("SQLX_MAX_LIFETIME_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            test_before_acquire: env::var("SQLX_TEST_BEFORE_ACQUIRE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            statement_cache_capacity: env::var("SQLX_STATEMENT_CACHE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse an optional environment variable, rejecting malformed values
fn parse_env<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::config_invalid(format!("Invalid {key} value '{raw}': {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            env_config::SQL_DATABASE_URL,
            env_config::DATABASE_URL,
            env_config::ENV,
            env_config::DB_STATEMENT_TIMEOUT_MS,
            env_config::DB_LOG_QUERIES,
            env_config::DB_MAX_CONNECTIONS,
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_parse_url_variants() {
        assert_eq!(DatabaseUrl::parse_url("sqlite::memory:").unwrap(), DatabaseUrl::Memory);
        assert_eq!(
            DatabaseUrl::parse_url("sqlite://data/app.db").unwrap(),
            DatabaseUrl::SQLite {
                path: PathBuf::from("data/app.db")
            }
        );
        assert!(DatabaseUrl::parse_url("postgres://u:p@localhost/db")
            .unwrap()
            .is_postgresql());
    }

    #[test]
    fn test_parse_url_rejects_unknown_scheme() {
        let error = DatabaseUrl::parse_url("mysql://localhost/db").unwrap_err();
        assert_eq!(error.kind(), ErrorCode::ConfigInvalid);
        assert!(error.message.contains("mysql"));
        assert_eq!(
            DatabaseUrl::parse_url("").unwrap_err().kind(),
            ErrorCode::ConfigInvalid
        );
        assert!(DatabaseUrl::parse_url("sqlite:").is_err());
    }

    #[test]
    fn test_redacts_password() {
        let url = DatabaseUrl::parse_url("postgresql://app:s3cret@db:5432/rizon").unwrap();
        assert_eq!(url.to_string(), "postgresql://app:***@db:5432/rizon");
        assert!(!format!("{url}").contains("s3cret"));
    }

    #[test]
    #[serial]
    fn test_from_env_prefers_sql_database_url() {
        clear_env();
        env::set_var(env_config::SQL_DATABASE_URL, "sqlite::memory:");
        env::set_var(env_config::DATABASE_URL, "postgres://ignored/db");
        let config = DatabaseConfig::from_env().unwrap();
        assert!(config.url.is_memory());
        assert!(config.log_queries);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_missing_url() {
        clear_env();
        let error = DatabaseConfig::from_env().unwrap_err();
        assert_eq!(error.kind(), ErrorCode::ConfigMissing);
    }

    #[test]
    #[serial]
    fn test_from_env_production_and_overrides() {
        clear_env();
        env::set_var(env_config::DATABASE_URL, "sqlite:/tmp/rizon.db");
        env::set_var(env_config::ENV, "production");
        env::set_var(env_config::DB_STATEMENT_TIMEOUT_MS, "0");
        let config = DatabaseConfig::from_env().unwrap();
        assert!(config.is_production());
        assert!(!config.log_queries);
        assert_eq!(config.statement_timeout(), None);

        env::set_var(env_config::DB_LOG_QUERIES, "true");
        assert!(DatabaseConfig::from_env().unwrap().log_queries);

        env::set_var(env_config::DB_MAX_CONNECTIONS, "many");
        let error = DatabaseConfig::from_env().unwrap_err();
        assert_eq!(error.kind(), ErrorCode::ConfigInvalid);
        clear_env();
    }
}
