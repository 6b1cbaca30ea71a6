// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides quiet logging, scratch SQLite stores and a small seeded schema
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `rizon_datastore`

use anyhow::Result;
use rizon_datastore::{DataAccess, Record, SqliteStore};
use std::env;
use std::sync::Once;
use tempfile::TempDir;
use tracing::Level;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => Level::TRACE,
            Ok("DEBUG") => Level::DEBUG,
            Ok("INFO") => Level::INFO,
            _ => Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// File-backed store in a fresh temporary directory
///
/// The directory must outlive the store, so both are returned.
pub async fn create_test_store() -> Result<(SqliteStore, TempDir)> {
    init_test_logging();
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite:{}", dir.path().join("test.db").display());
    let store = SqliteStore::connect(&url).await?;
    Ok((store, dir))
}

/// `users` and `orders` tables used across the suites
pub async fn create_schema<D: DataAccess + ?Sized>(db: &D) -> Result<()> {
    db.raw_execute(
        r"CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT,
            role TEXT NOT NULL DEFAULT 'member',
            age INTEGER,
            active BOOLEAN NOT NULL DEFAULT 1,
            deleted_at TEXT
        )",
        &[],
    )
    .await?;
    db.raw_execute(
        r"CREATE TABLE orders (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            amount INTEGER NOT NULL,
            status TEXT NOT NULL
        )",
        &[],
    )
    .await?;
    Ok(())
}

/// A user row with the columns most tests care about
pub fn user(id: i64, email: &str, name: &str, age: i64) -> Record {
    Record::new()
        .with("id", id)
        .with("email", email)
        .with("name", name)
        .with("age", age)
}

/// An order row
pub fn order(id: i64, user_id: i64, amount: i64, status: &str) -> Record {
    Record::new()
        .with("id", id)
        .with("user_id", user_id)
        .with("amount", amount)
        .with("status", status)
}

/// Five users aged 20, 25, 30, 35, 40 with ids 1..=5
pub async fn seed_users<D: DataAccess + ?Sized>(db: &D) -> Result<()> {
    let users: Vec<Record> = (1..=5)
        .map(|i| {
            user(
                i,
                &format!("user{i}@example.com"),
                &format!("User {i}"),
                15 + 5 * i,
            )
        })
        .collect();
    db.insert_many("users", &users).await?;
    Ok(())
}
