// ABOUTME: Ordered column/value map used for inserts, partial updates and decoded rows
// ABOUTME: Replaces reflection over untyped structs with an explicit field list built by the caller
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::value::Value;
use crate::errors::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::type_name;
use std::vec;

/// An insertion-ordered set of `(column, value)` pairs
///
/// Writes only touch the columns present in the record, so a partial update
/// is simply a record holding the changed columns. Column order is preserved
/// so generated statements are reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Create an empty record
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Create an empty record with room for `capacity` columns
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Set a column, replacing an existing value in place
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let column = column.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(name, _)| *name == column) {
            slot.1 = value;
        } else {
            self.fields.push((column, value));
        }
        self
    }

    /// Set a column only when a value is present
    pub fn set_opt<V: Into<Value>>(
        &mut self,
        column: impl Into<String>,
        value: Option<V>,
    ) -> &mut Self {
        if let Some(value) = value {
            self.set(column, value);
        }
        self
    }

    /// Builder form of [`Record::set`]
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Builder form of [`Record::set_opt`]
    #[must_use]
    pub fn with_opt<V: Into<Value>>(mut self, column: impl Into<String>, value: Option<V>) -> Self {
        self.set_opt(column, value);
        self
    }

    /// Value of a column
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Remove a column, returning its value
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let position = self.fields.iter().position(|(name, _)| name == column)?;
        Some(self.fields.remove(position).1)
    }

    /// Whether the column is present
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    /// Column names in insertion order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// `(column, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no columns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// JSON object with one member per column
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }

    /// Decode the record into a caller-supplied type
    ///
    /// # Errors
    ///
    /// Returns `SerializationError` if the columns do not match the shape of `T`
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_value(self.to_json()).map_err(|e| {
            AppError::serialization(format!(
                "failed to decode record into {}: {e}",
                type_name::<T>()
            ))
            .with_source(e)
        })
    }

    /// Build a record from a JSON object, skipping null members
    ///
    /// # Errors
    ///
    /// Returns `SerializationError` if the value is not a JSON object
    pub fn from_json_object(value: serde_json::Value) -> AppResult<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .filter(|(_, member)| !member.is_null())
                .map(|(name, member)| (name, Value::from(member)))
                .collect()),
            other => Err(AppError::serialization(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    /// Build a record from any serializable struct, skipping `None` fields
    ///
    /// Text-shaped fields (UUIDs, timestamps) arrive as `Value::Text`; use
    /// [`IntoRecord`] when the backend needs the native column type.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError` if the value does not serialize to an object
    pub fn from_serialize<T: Serialize>(value: &T) -> AppResult<Self> {
        Self::from_json_object(serde_json::to_value(value)?)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (column, value) in iter {
            record.set(column, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Schema-bound conversion of an entity into the columns it writes
pub trait IntoRecord {
    /// Columns and values for this entity
    fn into_record(self) -> Record;
}

impl IntoRecord for Record {
    fn into_record(self) -> Record {
        self
    }
}
