// ABOUTME: Integration tests for the runtime-selected Database store
// ABOUTME: Covers URL detection, environment loading and delegation of every operation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use anyhow::Result;
use rizon_datastore::config::DatabaseConfig;
use rizon_datastore::database_plugins::factory::detect_database_type;
use rizon_datastore::errors::ErrorCode;
use rizon_datastore::{
    DataAccess, DataStore, Database, DatabaseType, Filter, Index, QueryOption, Record, Relation,
    RelationRegistry, Transaction, Value,
};
use serial_test::serial;
use std::env;

mod common;

use common::{create_schema, init_test_logging, order, seed_users};

async fn file_database() -> Result<(Database, tempfile::TempDir)> {
    init_test_logging();
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite:{}", dir.path().join("factory.db").display());
    let db = Database::connect(&url).await?;
    Ok((db, dir))
}

#[test]
fn test_detects_backend_from_url() {
    assert_eq!(
        detect_database_type("sqlite:data/app.db").unwrap(),
        DatabaseType::SQLite
    );
    assert_eq!(
        detect_database_type("sqlite://data/app.db").unwrap(),
        DatabaseType::SQLite
    );
    assert_eq!(
        detect_database_type("").unwrap_err().kind(),
        ErrorCode::ConfigInvalid
    );
    assert_eq!(
        detect_database_type("redis://localhost").unwrap_err().kind(),
        ErrorCode::ConfigInvalid
    );
    assert_eq!(DatabaseType::SQLite.to_string(), "SQLite");
}

#[tokio::test]
async fn test_database_delegates_crud_to_sqlite() -> Result<()> {
    let (db, _dir) = file_database().await?;
    assert_eq!(db.database_type(), DatabaseType::SQLite);
    create_schema(&db).await?;
    seed_users(&db).await?;

    let filter = Filter::new().equals("id", 3_i64);
    db.update("users", &filter, &Record::new().with("role", "admin"))
        .await?;
    let admins = db
        .find_many(
            "users",
            "u",
            &QueryOption::new().filter(Filter::new().equals("role", "admin")),
        )
        .await?;
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].get("id"), Some(&Value::Int(3)));

    assert_eq!(db.delete("users", &filter).await?, 1);
    assert_eq!(db.count("users", "u", &QueryOption::new()).await?, 4);

    db.ensure_indices("users", &[Index::on("role")]).await?;
    db.drop_indices("users", &[Index::on("role")]).await?;

    Ok(())
}

#[tokio::test]
async fn test_database_relations_and_transactions() -> Result<()> {
    let (db, _dir) = file_database().await?;
    let db = db.with_relations(RelationRegistry::new().with(
        "orders",
        Relation::new("buyer", "users", "user_id", "id").column("email"),
    ));
    create_schema(&db).await?;
    seed_users(&db).await?;

    db.run_in_transaction(|tx| {
        Box::pin(async move {
            tx.insert("orders", &order(1, 4, 75, "paid")).await?;
            tx.insert("orders", &order(2, 4, 25, "open")).await
        })
    })
    .await?;

    let rows = db
        .find_many(
            "orders",
            "o",
            &QueryOption::new()
                .relation("buyer")
                .filter(Filter::new().equals("status", "paid")),
        )
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("buyer__email").and_then(Value::as_str),
        Some("user4@example.com")
    );

    let tx = db.begin_tx().await?;
    tx.delete_many("orders", &Filter::new()).await?;
    tx.rollback().await?;
    assert_eq!(db.count("orders", "o", &QueryOption::new()).await?, 2);

    Ok(())
}

#[tokio::test]
#[serial]
async fn test_from_env_requires_a_url() {
    env::remove_var("SQL_DATABASE_URL");
    env::remove_var("DATABASE_URL");

    let error = Database::from_env().await.err().unwrap();
    assert_eq!(error.kind(), ErrorCode::ConfigMissing);
}

#[tokio::test]
#[serial]
async fn test_from_env_connects_to_configured_url() -> Result<()> {
    env::set_var("SQL_DATABASE_URL", "sqlite::memory:");
    env::set_var("DB_STATEMENT_TIMEOUT_MS", "2000");

    let config = DatabaseConfig::from_env()?;
    assert!(config.url.is_memory());

    let db = Database::from_env().await?;
    db.ping().await?;
    db.close().await;

    env::remove_var("SQL_DATABASE_URL");
    env::remove_var("DB_STATEMENT_TIMEOUT_MS");
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_invalid_env_number_is_config_invalid() {
    env::set_var("SQL_DATABASE_URL", "sqlite::memory:");
    env::set_var("DB_MAX_CONNECTIONS", "lots");

    let error = Database::from_env().await.err().unwrap();
    assert_eq!(error.kind(), ErrorCode::ConfigInvalid);

    env::remove_var("SQL_DATABASE_URL");
    env::remove_var("DB_MAX_CONNECTIONS");
}

#[tokio::test]
async fn test_closed_database_reports_connectivity() -> Result<()> {
    let (db, _dir) = file_database().await?;
    create_schema(&db).await?;
    db.close().await;

    let error = db
        .insert("users", &Record::new().with("id", 1_i64).with("email", "x"))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorCode::Connectivity);

    Ok(())
}
