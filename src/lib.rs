// ABOUTME: Main library entry point for the Rizon data-access layer
// ABOUTME: One DataStore contract over SQLite and PostgreSQL with backend-neutral query options
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Rizon Datastore
//!
//! A storage-agnostic data-access layer. Callers describe what to read or
//! write with [`QueryOption`], [`Record`] and [`Index`]; a backend turns that
//! description into parameterized SQL and executes it.
//!
//! ## Architecture
//!
//! - **`database_plugins`**: the [`DataStore`], [`DataAccess`] and
//!   [`Transaction`] contracts, the `SQLite` and `PostgreSQL` backends, and
//!   the [`Database`] factory that picks one from a URL
//! - **config**: connection, pool and statement settings loaded from the environment
//! - **logging**: `tracing` subscriber setup
//! - **errors**: the [`AppError`] taxonomy every operation reports through
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rizon_datastore::{DataAccess, Database, DataStore, Filter, QueryOption, Record};
//! use rizon_datastore::errors::AppResult;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let db = Database::connect("sqlite::memory:").await?;
//!     db.raw_execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", &[])
//!         .await?;
//!     db.insert("users", &Record::new().with("id", 1).with("name", "ada"))
//!         .await?;
//!
//!     let options = QueryOption::new().filter(Filter::new().equals("name", "ada"));
//!     let users = db.find_many("users", "u", &options).await?;
//!     assert_eq!(users.len(), 1);
//!     db.close().await;
//!     Ok(())
//! }
//! ```

/// Connection, pool and statement configuration
pub mod config;

/// Data-access contracts and their relational backends
pub mod database_plugins;

/// Unified error handling
pub mod errors;

/// Structured logging setup
pub mod logging;

pub use database_plugins::factory::{Database, DatabaseTransaction, DatabaseType};
#[cfg(feature = "postgresql")]
pub use database_plugins::postgres::{PostgresStore, PostgresTransaction};
pub use database_plugins::sqlite::{SqliteStore, SqliteTransaction};
pub use database_plugins::{DataAccess, DataAccessExt, DataStore, Transaction};
pub use rizon_core::models::{
    AggregateExpr, AggregateFn, CompareOp, Condition, Filter, FilterOp, Having, Index, IntoRecord,
    JoinKind, JoinOn, JoinOption, QueryOption, Record, Relation, RelationRegistry, SortOrder,
    Value,
};
