// ABOUTME: PostgreSQL implementation of the DataStore contract on an sqlx connection pool
// ABOUTME: Binds uuid, timestamptz and jsonb natively; enabled by the postgresql feature

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! `PostgreSQL` backend

use super::shared::builders::postgres_query;
use super::shared::execution::{run_statement, StoreOptions};
use super::shared::mappers::postgres_row_to_record;
use super::shared::query_builder::{Dialect, Statement, StatementBuilder};
use super::shared::transactions::PostgresTransactionGuard;
use super::{DataStore, SqlSession, Transaction};
use crate::config::database::{DatabaseConfig, DatabaseUrl};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use rizon_core::models::{Index, Record, RelationRegistry};
use sqlx::postgres::{PgConnectOptions, PgPool};
use sqlx::Connection;
use std::str::FromStr;
use tracing::info;

const BACKEND: &str = "PostgreSQL";

/// `PostgreSQL` store
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    statements: StatementBuilder,
    options: StoreOptions,
}

impl PostgresStore {
    /// Open a store from a `postgres://` URL with default settings
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for a malformed URL and `Connectivity` if the
    /// server cannot be reached
    pub async fn connect(url: &str) -> AppResult<Self> {
        Self::from_config(&DatabaseConfig::new(DatabaseUrl::parse_url(url)?)).await
    }

    /// Open a store from a loaded configuration (single attempt)
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if the URL is not a `PostgreSQL` URL and
    /// `Connectivity` if the server cannot be reached
    pub async fn from_config(config: &DatabaseConfig) -> AppResult<Self> {
        let DatabaseUrl::PostgreSQL { connection_string } = &config.url else {
            return Err(AppError::config_invalid(format!(
                "{} is not a PostgreSQL database URL",
                config.url
            )));
        };
        let mut connect_options = PgConnectOptions::from_str(connection_string)?;
        if let Some(capacity) = config.sqlx.statement_cache_capacity {
            connect_options = connect_options.statement_cache_capacity(capacity);
        }
        let pool = config
            .pool_options::<sqlx::Postgres>()
            .connect_with(connect_options)
            .await?;
        info!(url = %config.url, "PostgreSQL pool opened");
        Ok(Self::from_pool(pool).with_options(StoreOptions::from_config(config)))
    }

    /// Wrap an existing pool
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            statements: StatementBuilder::new(Dialect::Postgres),
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
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SqlSession for PostgresStore {
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
            postgres_query(&statement).fetch_all(&self.pool),
        )
        .await?;
        rows.iter().map(postgres_row_to_record).collect()
    }

    async fn fetch_optional(&self, statement: Statement) -> AppResult<Option<Record>> {
        let row = run_statement(
            &self.options,
            BACKEND,
            &statement,
            postgres_query(&statement).fetch_optional(&self.pool),
        )
        .await?;
        row.as_ref().map(postgres_row_to_record).transpose()
    }

    async fn execute(&self, statement: Statement) -> AppResult<u64> {
        let result = run_statement(
            &self.options,
            BACKEND,
            &statement,
            postgres_query(&statement).execute(&self.pool),
        )
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl DataStore for PostgresStore {
    type Tx = PostgresTransaction;

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

    async fn begin_tx(&self) -> AppResult<PostgresTransaction> {
        let statement = Statement::new("BEGIN", Vec::new());
        let tx = run_statement(&self.options, BACKEND, &statement, self.pool.begin()).await?;
        Ok(PostgresTransaction {
            guard: PostgresTransactionGuard::new(tx, BACKEND),
            statements: self.statements.clone(),
            options: self.options,
        })
    }

    async fn ensure_indices(&self, target: &str, indices: &[Index]) -> AppResult<()> {
        let statements = indices
            .iter()
            .map(|index| self.statements.create_index(target, index))
            .collect::<AppResult<Vec<_>>>()?;
        for statement in statements {
            self.execute(statement).await?;
        }
        Ok(())
    }

    async fn drop_indices(&self, target: &str, indices: &[Index]) -> AppResult<()> {
        let statements = indices
            .iter()
            .map(|index| self.statements.drop_index(target, index))
            .collect::<AppResult<Vec<_>>>()?;
        for statement in statements {
            self.execute(statement).await?;
        }
        Ok(())
    }
}

/// Transaction handle issued by [`PostgresStore`]
pub struct PostgresTransaction {
    guard: PostgresTransactionGuard,
    statements: StatementBuilder,
    options: StoreOptions,
}

#[async_trait]
impl SqlSession for PostgresTransaction {
    fn statements(&self) -> &StatementBuilder {
        &self.statements
    }

    fn session_backend(&self) -> &'static str {
        BACKEND
    }

    async fn fetch_all(&self, statement: Statement) -> AppResult<Vec<Record>> {
        let mut slot = self.guard.lock().await;
        let conn = PostgresTransactionGuard::executor(&mut slot)?;
        let rows = run_statement(
            &self.options,
            BACKEND,
            &statement,
            postgres_query(&statement).fetch_all(conn),
        )
        .await?;
        rows.iter().map(postgres_row_to_record).collect()
    }

    async fn fetch_optional(&self, statement: Statement) -> AppResult<Option<Record>> {
        let mut slot = self.guard.lock().await;
        let conn = PostgresTransactionGuard::executor(&mut slot)?;
        let row = run_statement(
            &self.options,
            BACKEND,
            &statement,
            postgres_query(&statement).fetch_optional(conn),
        )
        .await?;
        row.as_ref().map(postgres_row_to_record).transpose()
    }

    async fn execute(&self, statement: Statement) -> AppResult<u64> {
        let mut slot = self.guard.lock().await;
        let conn = PostgresTransactionGuard::executor(&mut slot)?;
        let result = run_statement(
            &self.options,
            BACKEND,
            &statement,
            postgres_query(&statement).execute(conn),
        )
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self) -> AppResult<()> {
        self.guard.commit().await
    }

    async fn rollback(self) -> AppResult<()> {
        self.guard.rollback().await
    }
}
