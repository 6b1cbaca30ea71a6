// ABOUTME: SQLite implementation of the DataStore contract on an sqlx connection pool
// ABOUTME: Default backend for embedded deployments and local development

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! `SQLite` backend

use super::shared::builders::sqlite_query;
use super::shared::execution::{run_statement, StoreOptions};
use super::shared::mappers::sqlite_row_to_record;
use super::shared::query_builder::{Dialect, Statement, StatementBuilder};
use super::shared::transactions::SqliteTransactionGuard;
use super::{DataStore, SqlSession, Transaction};
use crate::config::database::{DatabaseConfig, DatabaseUrl, SqlxConfig};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use rizon_core::models::{Index, Record, RelationRegistry};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use sqlx::Connection;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const BACKEND: &str = "SQLite";

/// `SQLite` store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    statements: StatementBuilder,
    options: StoreOptions,
}

impl SqliteStore {
    /// Open a store from a `sqlite:` URL with default settings
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for a malformed URL and `Connectivity` if the
    /// database cannot be opened
    pub async fn connect(url: &str) -> AppResult<Self> {
        Self::from_config(&DatabaseConfig::new(DatabaseUrl::parse_url(url)?)).await
    }

    /// Open a store from a loaded configuration (single attempt)
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if the URL is not a `SQLite` URL and
    /// `Connectivity` if the database cannot be opened
    pub async fn from_config(config: &DatabaseConfig) -> AppResult<Self> {
        let connect_options = Self::connect_options(&config.url, &config.sqlx)?;
        let pool = config
            .pool_options::<sqlx::Sqlite>()
            .connect_with(connect_options)
            .await?;
        info!(url = %config.url, "SQLite pool opened");
        Ok(Self::from_pool(pool).with_options(StoreOptions::from_config(config)))
    }

    /// Wrap an existing pool
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            statements: StatementBuilder::new(Dialect::Sqlite),
            options: StoreOptions::default(),
        }
    }

    /// Register the relations `QueryOption::relations` may name
    #[must_use]
    pub fn with_relations(mut self, relations: RelationRegistry) -> Self {
        self.statements = self.statements.with_relations(relations);
        self
    }

    /// Replace the execution settings
    #[must_use]
    pub const fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// The underlying pool, for work the store does not model
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn connect_options(url: &DatabaseUrl, sqlx: &SqlxConfig) -> AppResult<SqliteConnectOptions> {
        let options = match url {
            DatabaseUrl::Memory => SqliteConnectOptions::from_str("sqlite::memory:")?,
            DatabaseUrl::SQLite { path } => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            DatabaseUrl::PostgreSQL { .. } => {
                return Err(AppError::config_invalid(format!(
                    "{url} is not a SQLite database URL"
                )));
            }
        };
        let options = options
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        Ok(match sqlx.statement_cache_capacity {
            Some(capacity) => options.statement_cache_capacity(capacity),
            None => options,
        })
    }

    fn index_statements(
        &self,
        target: &str,
        indices: &[Index],
        build: impl Fn(&StatementBuilder, &str, &Index) -> AppResult<Statement>,
    ) -> AppResult<Vec<Statement>> {
        indices
            .iter()
            .map(|index| build(&self.statements, target, index))
            .collect()
    }
}

#[async_trait]
impl SqlSession for SqliteStore {
    fn statements(&self) -> &StatementBuilder {
        &self.statements
    }

    fn session_backend(&self) -> &'static str {
        BACKEND
    }

    async fn fetch_all(&self, statement: Statement) -> AppResult<Vec<Record>> {
        let rows = run_statement(
            &self.options,
            BACKEND,
            &statement,
            sqlite_query(&statement).fetch_all(&self.pool),
        )
        .await?;
        rows.iter().map(sqlite_row_to_record).collect()
    }

    async fn fetch_optional(&self, statement: Statement) -> AppResult<Option<Record>> {
        let row = run_statement(
            &self.options,
            BACKEND,
            &statement,
            sqlite_query(&statement).fetch_optional(&self.pool),
        )
        .await?;
        row.as_ref().map(sqlite_row_to_record).transpose()
    }

    async fn execute(&self, statement: Statement) -> AppResult<u64> {
        let result = run_statement(
            &self.options,
            BACKEND,
            &statement,
            sqlite_query(&statement).execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl DataStore for SqliteStore {
    type Tx = SqliteTransaction;

    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn ping(&self) -> AppResult<()> {
        let statement = Statement::new("-- ping", Vec::new());
        run_statement(&self.options, BACKEND, &statement, async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await
        })
        .await
    }

    async fn close(&self) {
        self.pool.close().await;
        info!(backend = BACKEND, "Connection pool closed");
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    async fn begin_tx(&self) -> AppResult<SqliteTransaction> {
        let statement = Statement::new("BEGIN", Vec::new());
        let tx = run_statement(&self.options, BACKEND, &statement, self.pool.begin()).await?;
        Ok(SqliteTransaction {
            guard: SqliteTransactionGuard::new(tx, BACKEND),
            statements: self.statements.clone(),
            options: self.options,
        })
    }

    async fn ensure_indices(&self, target: &str, indices: &[Index]) -> AppResult<()> {
        for statement in self.index_statements(target, indices, StatementBuilder::create_index)? {
            self.execute(statement).await?;
        }
        Ok(())
    }

    async fn drop_indices(&self, target: &str, indices: &[Index]) -> AppResult<()> {
        for statement in self.index_statements(target, indices, StatementBuilder::drop_index)? {
            self.execute(statement).await?;
        }
        Ok(())
    }
}

/// Transaction handle issued by [`SqliteStore`]
pub struct SqliteTransaction {
    guard: SqliteTransactionGuard,
    statements: StatementBuilder,
    options: StoreOptions,
}

#[async_trait]
impl SqlSession for SqliteTransaction {
    fn statements(&self) -> &StatementBuilder {
        &self.statements
    }

    fn session_backend(&self) -> &'static str {
        BACKEND
    }

    async fn fetch_all(&self, statement: Statement) -> AppResult<Vec<Record>> {
        let mut slot = self.guard.lock().await;
        let conn = SqliteTransactionGuard::executor(&mut slot)?;
        let rows = run_statement(
            &self.options,
            BACKEND,
            &statement,
            sqlite_query(&statement).fetch_all(conn),
        )
        .await?;
        rows.iter().map(sqlite_row_to_record).collect()
    }

    async fn fetch_optional(&self, statement: Statement) -> AppResult<Option<Record>> {
        let mut slot = self.guard.lock().await;
        let conn = SqliteTransactionGuard::executor(&mut slot)?;
        let row = run_statement(
            &self.options,
            BACKEND,
            &statement,
            sqlite_query(&statement).fetch_optional(conn),
        )
        .await?;
        row.as_ref().map(sqlite_row_to_record).transpose()
    }

    async fn execute(&self, statement: Statement) -> AppResult<u64> {
        let mut slot = self.guard.lock().await;
        let conn = SqliteTransactionGuard::executor(&mut slot)?;
        let result = run_statement(
            &self.options,
            BACKEND,
            &statement,
            sqlite_query(&statement).execute(conn),
        )
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(self) -> AppResult<()> {
        self.guard.commit().await
    }

    async fn rollback(self) -> AppResult<()> {
        self.guard.rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_plugins::DataAccess;
    use crate::errors::ErrorCode;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store
            .raw_execute("CREATE TABLE kv (k TEXT PRIMARY KEY, v INTEGER)", &[])
            .await
            .unwrap();
        store
            .insert("kv", &Record::new().with("k", "a").with("v", 1))
            .await
            .unwrap();
        let rows = store.raw_query("SELECT k, v FROM kv", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("v").and_then(|v| v.as_i64()), Some(1));
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_postgres_url_is_rejected() {
        let error = SqliteStore::connect("postgres://localhost/db")
            .await
            .err()
            .unwrap();
        assert_eq!(error.kind(), ErrorCode::ConfigInvalid);
    }
}
