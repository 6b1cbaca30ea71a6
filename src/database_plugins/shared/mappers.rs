// ABOUTME: SQL row to Record conversion helpers for database operations.
// ABOUTME: Maps each backend's column types onto the portable Value representation.

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! SQL row → [`Record`] conversion
//!
//! Columns keep their result-set order and names, so relation projections
//! arrive as `<relation>__<column>`.

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rizon_core::models::{Record, Value};
#[cfg(feature = "postgresql")]
use rust_decimal::prelude::ToPrimitive;
#[cfg(feature = "postgresql")]
use rust_decimal::Decimal;
#[cfg(feature = "postgresql")]
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Convert a `SQLite` row
///
/// `SQLite` values are dynamically typed; the storage class of each value
/// decides the variant, except that columns declared `BOOLEAN` or `DATETIME`
/// decode to [`Value::Bool`] and [`Value::Timestamp`].
///
/// # Errors
///
/// Returns `SerializationError` if a value cannot be decoded
pub fn sqlite_row_to_record(row: &SqliteRow) -> AppResult<Record> {
    let mut record = Record::with_capacity(row.len());
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            record.set(column.name(), Value::Null);
            continue;
        }
        let storage = raw.type_info().name().to_owned();
        let value = match (column.type_info().name(), storage.as_str()) {
            ("BOOLEAN", "INTEGER") => Value::Bool(row.try_get::<bool, _>(index)?),
            ("DATETIME", "TEXT") => Value::Timestamp(row.try_get::<DateTime<Utc>, _>(index)?),
            (_, "INTEGER") => Value::Int(row.try_get::<i64, _>(index)?),
            (_, "REAL") => Value::Float(row.try_get::<f64, _>(index)?),
            (_, "BLOB") => Value::Bytes(row.try_get::<Vec<u8>, _>(index)?),
            _ => Value::Text(row.try_get::<String, _>(index)?),
        };
        record.set(column.name(), value);
    }
    Ok(record)
}

/// Convert a `PostgreSQL` row
///
/// `NUMERIC` (what `SUM` over integers and every `AVG` produce) decodes to
/// [`Value::Int`] when its scale is zero and to [`Value::Float`] otherwise.
///
/// # Errors
///
/// Returns `SerializationError` for column types with no [`Value`] mapping
/// (cast them in the query, e.g. `amount::float8`)
#[cfg(feature = "postgresql")]
pub fn postgres_row_to_record(row: &PgRow) -> AppResult<Record> {
    let mut record = Record::with_capacity(row.len());
    for column in row.columns() {
        let index = column.ordinal();
        if row.try_get_raw(index)?.is_null() {
            record.set(column.name(), Value::Null);
            continue;
        }
        let value = match column.type_info().name() {
            "BOOL" => Value::Bool(row.try_get(index)?),
            "INT2" => Value::Int(i64::from(row.try_get::<i16, _>(index)?)),
            "INT4" => Value::Int(i64::from(row.try_get::<i32, _>(index)?)),
            "INT8" => Value::Int(row.try_get(index)?),
            "FLOAT4" => Value::Float(f64::from(row.try_get::<f32, _>(index)?)),
            "FLOAT8" => Value::Float(row.try_get(index)?),
            "NUMERIC" => numeric_value(column.name(), row.try_get::<Decimal, _>(index)?)?,
            "UUID" => Value::Uuid(row.try_get(index)?),
            "TIMESTAMPTZ" => Value::Timestamp(row.try_get(index)?),
            "TIMESTAMP" => Value::Timestamp(
                row.try_get::<chrono::NaiveDateTime, _>(index)?.and_utc(),
            ),
            "DATE" => Value::Text(row.try_get::<chrono::NaiveDate, _>(index)?.to_string()),
            "JSON" | "JSONB" => Value::Json(row.try_get(index)?),
            "BYTEA" => Value::Bytes(row.try_get(index)?),
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => {
                Value::Text(row.try_get(index)?)
            }
            other => {
                return Err(AppError::serialization(format!(
                    "column '{}' has unsupported type {other}",
                    column.name()
                )));
            }
        };
        record.set(column.name(), value);
    }
    Ok(record)
}

#[cfg(feature = "postgresql")]
fn numeric_value(column: &str, decimal: Decimal) -> AppResult<Value> {
    let converted = if decimal.scale() == 0 {
        decimal.to_i64().map(Value::Int)
    } else {
        decimal.to_f64().map(Value::Float)
    };
    converted.ok_or_else(|| {
        AppError::serialization(format!("column '{column}' holds {decimal}, which is out of range"))
    })
}

/// First column of a row as a [`Value`], for single-column results
///
/// # Errors
///
/// Returns `SerializationError` if the row has no columns
pub fn first_value(record: Record) -> AppResult<Value> {
    record
        .into_iter()
        .next()
        .map(|(_, value)| value)
        .ok_or_else(|| AppError::serialization("result row has no columns"))
}

/// Read the `count` column produced by the count statement
///
/// # Errors
///
/// Returns `SerializationError` if the column is missing or negative
pub fn count_from_record(record: &Record) -> AppResult<u64> {
    let count = record
        .get("count")
        .and_then(Value::as_i64)
        .ok_or_else(|| AppError::serialization("count query returned no integer 'count' column"))?;
    u64::try_from(count)
        .map_err(|_| AppError::serialization(format!("count query returned {count}")))
}
