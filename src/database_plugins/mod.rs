// ABOUTME: Storage-agnostic data-access contract with SQLite and PostgreSQL backends
// ABOUTME: Defines DataAccess, Transaction and DataStore plus the shared SQL execution path

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Database abstraction layer
//!
//! [`DataStore`] is the capability contract a backend implements; the
//! transaction handle it hands out implements the same [`DataAccess`]
//! operations, so code written against `&impl DataAccess` runs unchanged
//! inside or outside a transaction.
//!
//! Relational backends only provide a [`SqlSession`]: three primitive
//! executors and a [`StatementBuilder`]. Every `DataAccess` operation is
//! implemented once on top of that, which keeps validation, statement shape
//! and error mapping identical across backends.

use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use rizon_core::models::{Filter, Index, QueryOption, Record, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::mappers::{count_from_record, first_value};
use shared::query_builder::{Statement, StatementBuilder};
use std::panic::{resume_unwind, AssertUnwindSafe};
use tracing::{debug, error, warn};

/// Backend selection and the `Database` enum
pub mod factory;
/// Logic shared by the relational backends
pub mod shared;
/// `SQLite` backend
pub mod sqlite;

/// `PostgreSQL` backend
#[cfg(feature = "postgresql")]
pub mod postgres;

/// Operations available on a store and on a transaction handle alike
///
/// Mutations return the number of rows affected.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Insert one record
    async fn insert(&self, target: &str, record: &Record) -> AppResult<u64>;

    /// Insert several records in one statement; an empty slice is a no-op
    async fn insert_many(&self, target: &str, records: &[Record]) -> AppResult<u64>;

    /// Write the fields present in `changes` to every row matching `filter`
    ///
    /// Refuses an empty filter; use [`DataAccess::update_many`] to touch every row.
    async fn update(&self, target: &str, filter: &Filter, changes: &Record) -> AppResult<u64>;

    /// Like [`DataAccess::update`], but an empty filter matches all rows
    async fn update_many(&self, target: &str, filter: &Filter, changes: &Record)
        -> AppResult<u64>;

    /// Insert, or overwrite the non-key fields of the row whose `conflict_key` matches
    async fn upsert(&self, target: &str, conflict_key: &str, record: &Record) -> AppResult<u64>;

    /// Delete rows matching `filter`; refuses an empty filter
    async fn delete(&self, target: &str, filter: &Filter) -> AppResult<u64>;

    /// Delete rows matching `filter`; an empty filter deletes every row
    async fn delete_many(&self, target: &str, filter: &Filter) -> AppResult<u64>;

    /// First row matching the options, if any
    async fn find_one(
        &self,
        target: &str,
        alias: &str,
        options: &QueryOption,
    ) -> AppResult<Option<Record>>;

    /// Every row matching the options, subject to limit and skip
    async fn find_many(
        &self,
        target: &str,
        alias: &str,
        options: &QueryOption,
    ) -> AppResult<Vec<Record>>;

    /// Number of matching rows; limit, skip and projection are ignored
    async fn count(&self, target: &str, alias: &str, options: &QueryOption) -> AppResult<u64>;

    /// Unique values of `field` among rows matching `filter`
    async fn distinct(&self, target: &str, field: &str, filter: &Filter) -> AppResult<Vec<Value>>;

    /// Run a backend-native aggregation pipeline
    ///
    /// Relational backends have none and always return `InvalidQuery`.
    async fn aggregate(
        &self,
        target: &str,
        pipeline: &[serde_json::Value],
    ) -> AppResult<Vec<Record>>;

    /// Parameterized query returning rows
    async fn raw_query(&self, sql: &str, params: &[Value]) -> AppResult<Vec<Record>>;

    /// Parameterized statement returning rows affected
    async fn raw_execute(&self, sql: &str, params: &[Value]) -> AppResult<u64>;
}

/// A unit of work opened by [`DataStore::begin_tx`]
///
/// Both endings consume the handle. Dropping it without either rolls back.
#[async_trait]
pub trait Transaction: DataAccess + Sized {
    /// Make every write issued through this handle durable
    async fn commit(self) -> AppResult<()>;

    /// Discard every write issued through this handle
    async fn rollback(self) -> AppResult<()>;
}

/// Backend capability contract
#[async_trait]
pub trait DataStore: DataAccess {
    /// Transaction handle type
    type Tx: Transaction + 'static;

    /// Human-readable backend name
    fn backend_name(&self) -> &'static str;

    /// Verify a connection can be acquired and used
    async fn ping(&self) -> AppResult<()>;

    /// Stop accepting operations and wait for in-flight ones to release
    /// their connections; afterwards every operation fails with `Connectivity`
    async fn close(&self);

    /// Whether [`DataStore::close`] has been called
    fn is_closed(&self) -> bool;

    /// Open a transaction on a dedicated connection
    async fn begin_tx(&self) -> AppResult<Self::Tx>;

    /// Create each index if it does not exist
    async fn ensure_indices(&self, target: &str, indices: &[Index]) -> AppResult<()>;

    /// Drop each index if it exists
    async fn drop_indices(&self, target: &str, indices: &[Index]) -> AppResult<()>;

    /// Run `work` inside a transaction
    ///
    /// Commits when `work` returns `Ok`. When it returns `Err` or panics, the
    /// transaction is rolled back before the error is returned or the panic
    /// resumed. If that rollback itself fails, the rollback error is returned
    /// with the original error attached as its source.
    ///
    /// ```text
    /// let id = store.run_in_transaction(|tx| Box::pin(async move {
    ///     tx.insert("orders", &order).await?;
    ///     tx.insert("order_lines", &line).await?;
    ///     Ok(order_id)
    /// })).await?;
    /// ```
    async fn run_in_transaction<F, T>(&self, work: F) -> AppResult<T>
    where
        F: for<'t> FnOnce(&'t Self::Tx) -> BoxFuture<'t, AppResult<T>> + Send,
        T: Send,
    {
        let tx = self.begin_tx().await?;
        let outcome = AssertUnwindSafe(work(&tx)).catch_unwind().await;
        match outcome {
            Ok(Ok(value)) => {
                tx.commit().await?;
                Ok(value)
            }
            Ok(Err(original)) => {
                debug!(backend = self.backend_name(), error = %original, "Rolling back failed unit of work");
                match tx.rollback().await {
                    Ok(()) => Err(original),
                    Err(rollback) => {
                        error!(
                            backend = self.backend_name(),
                            error = %rollback,
                            original = %original,
                            "Rollback failed"
                        );
                        Err(AppError::new(
                            rollback.code,
                            format!("rollback failed ({}) after: {original}", rollback.message),
                        )
                        .with_source(original))
                    }
                }
            }
            Err(panic) => {
                warn!(backend = self.backend_name(), "Unit of work panicked, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    error!(backend = self.backend_name(), error = %rollback, "Rollback after panic failed");
                }
                resume_unwind(panic)
            }
        }
    }
}

/// Typed conveniences over [`DataAccess`]
#[async_trait]
pub trait DataAccessExt: DataAccess {
    /// Like [`DataAccess::find_one`], but `ResourceNotFound` when nothing matches
    async fn find_one_required(
        &self,
        target: &str,
        alias: &str,
        options: &QueryOption,
    ) -> AppResult<Record> {
        self.find_one(target, alias, options)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{target} matching the query")))
    }

    /// First matching row decoded into `T`
    async fn find_one_as<T>(
        &self,
        target: &str,
        alias: &str,
        options: &QueryOption,
    ) -> AppResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.find_one(target, alias, options)
            .await?
            .map(|record| record.decode())
            .transpose()
    }

    /// Every matching row decoded into `T`
    async fn find_many_as<T>(
        &self,
        target: &str,
        alias: &str,
        options: &QueryOption,
    ) -> AppResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.find_many(target, alias, options)
            .await?
            .iter()
            .map(Record::decode)
            .collect()
    }

    /// Partial update from a serializable payload; `None` fields are left untouched
    async fn update_from<T>(&self, target: &str, filter: &Filter, changes: &T) -> AppResult<u64>
    where
        T: Serialize + Sync,
    {
        let changes = Record::from_serialize(changes)?;
        self.update(target, filter, &changes).await
    }
}

impl<D: DataAccess + ?Sized> DataAccessExt for D {}

/// Primitive executors a relational backend provides
///
/// Everything in [`DataAccess`] is derived from these.
#[async_trait]
pub trait SqlSession: Send + Sync {
    /// Statement builder for this backend's dialect
    fn statements(&self) -> &StatementBuilder;

    /// Backend name for logs
    fn session_backend(&self) -> &'static str;

    /// Run a query and return every row
    async fn fetch_all(&self, statement: Statement) -> AppResult<Vec<Record>>;

    /// Run a query and return the first row, if any
    async fn fetch_optional(&self, statement: Statement) -> AppResult<Option<Record>>;

    /// Run a statement and return rows affected
    async fn execute(&self, statement: Statement) -> AppResult<u64>;
}

fn require_filter(operation: &str, target: &str, filter: &Filter) -> AppResult<()> {
    if filter.is_empty() {
        return Err(AppError::invalid_query(format!(
            "{operation} on '{target}' requires a filter; use {operation}_many to affect every row"
        )));
    }
    Ok(())
}

#[async_trait]
impl<S: SqlSession + ?Sized> DataAccess for S {
    async fn insert(&self, target: &str, record: &Record) -> AppResult<u64> {
        let statement = self.statements().insert(target, record)?;
        self.execute(statement).await
    }

    async fn insert_many(&self, target: &str, records: &[Record]) -> AppResult<u64> {
        match self.statements().insert_many(target, records)? {
            Some(statement) => self.execute(statement).await,
            None => Ok(0),
        }
    }

    async fn update(&self, target: &str, filter: &Filter, changes: &Record) -> AppResult<u64> {
        require_filter("update", target, filter)?;
        self.update_many(target, filter, changes).await
    }

    async fn update_many(
        &self,
        target: &str,
        filter: &Filter,
        changes: &Record,
    ) -> AppResult<u64> {
        let statement = self.statements().update(target, filter, changes)?;
        self.execute(statement).await
    }

    async fn upsert(&self, target: &str, conflict_key: &str, record: &Record) -> AppResult<u64> {
        let statement = self.statements().upsert(target, conflict_key, record)?;
        self.execute(statement).await
    }

    async fn delete(&self, target: &str, filter: &Filter) -> AppResult<u64> {
        require_filter("delete", target, filter)?;
        self.delete_many(target, filter).await
    }

    async fn delete_many(&self, target: &str, filter: &Filter) -> AppResult<u64> {
        let statement = self.statements().delete(target, filter)?;
        self.execute(statement).await
    }

    async fn find_one(
        &self,
        target: &str,
        alias: &str,
        options: &QueryOption,
    ) -> AppResult<Option<Record>> {
        let statement = self.statements().select_one(target, alias, options)?;
        self.fetch_optional(statement).await
    }

    async fn find_many(
        &self,
        target: &str,
        alias: &str,
        options: &QueryOption,
    ) -> AppResult<Vec<Record>> {
        let statement = self.statements().select(target, alias, options)?;
        self.fetch_all(statement).await
    }

    async fn count(&self, target: &str, alias: &str, options: &QueryOption) -> AppResult<u64> {
        let statement = self.statements().count(target, alias, options)?;
        let row = self
            .fetch_optional(statement)
            .await?
            .ok_or_else(|| AppError::serialization("count query returned no row"))?;
        count_from_record(&row)
    }

    async fn distinct(&self, target: &str, field: &str, filter: &Filter) -> AppResult<Vec<Value>> {
        let statement = self.statements().distinct(target, field, filter)?;
        self.fetch_all(statement)
            .await?
            .into_iter()
            .map(first_value)
            .collect()
    }

    async fn aggregate(
        &self,
        target: &str,
        _pipeline: &[serde_json::Value],
    ) -> AppResult<Vec<Record>> {
        Err(AppError::invalid_query(format!(
            "aggregation pipelines are not supported by {} (target '{target}'); use raw_query",
            self.session_backend()
        )))
    }

    async fn raw_query(&self, sql: &str, params: &[Value]) -> AppResult<Vec<Record>> {
        if sql.trim().is_empty() {
            return Err(AppError::invalid_query("raw query is empty"));
        }
        self.fetch_all(Statement::new(sql, params.to_vec())).await
    }

    async fn raw_execute(&self, sql: &str, params: &[Value]) -> AppResult<u64> {
        if sql.trim().is_empty() {
            return Err(AppError::invalid_query("raw statement is empty"));
        }
        self.execute(Statement::new(sql, params.to_vec())).await
    }
}
