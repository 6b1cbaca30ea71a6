// ABOUTME: Query parameter binding helpers
// ABOUTME: Turns a built Statement into an sqlx query with every value bound in placeholder order
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::query_builder::Statement;
use chrono::SecondsFormat;
use rizon_core::models::Value;
use sqlx::query::Query;
#[cfg(feature = "postgresql")]
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::sqlite::{Sqlite, SqliteArguments};
#[cfg(feature = "postgresql")]
use sqlx::types::Json;

/// `SQLite` query with all statement parameters bound
///
/// `SQLite` has no native uuid, timestamp or json storage, so those bind as
/// text (timestamps as RFC 3339 in UTC).
#[must_use]
pub fn sqlite_query(statement: &Statement) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    statement
        .params
        .iter()
        .fold(sqlx::query(&statement.sql), |query, value| bind_sqlite(query, value))
}

fn bind_sqlite<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::Uuid(u) => query.bind(u.to_string()),
        Value::Timestamp(ts) => query.bind(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        Value::Json(json) => query.bind(json.to_string()),
        Value::Bytes(bytes) => query.bind(bytes.clone()),
    }
}

/// `PostgreSQL` query with all statement parameters bound using native types
#[cfg(feature = "postgresql")]
#[must_use]
pub fn postgres_query(
    statement: &Statement,
) -> Query<'_, Postgres, PgArguments> {
    statement
        .params
        .iter()
        .fold(sqlx::query(&statement.sql), |query, value| bind_postgres(query, value))
}

#[cfg(feature = "postgresql")]
fn bind_postgres<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::Uuid(u) => query.bind(*u),
        Value::Timestamp(ts) => query.bind(*ts),
        Value::Json(json) => query.bind(Json(json.clone())),
        Value::Bytes(bytes) => query.bind(bytes.clone()),
    }
}
