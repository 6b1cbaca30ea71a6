// ABOUTME: Backend-neutral scalar value used for bound parameters and decoded columns
// ABOUTME: Converts to and from serde_json so records can decode into caller types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// A single column value
///
/// Statement builders never interpolate a `Value` into SQL text; every
/// non-null value becomes a bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL `NULL`
    Null,
    /// Boolean
    Bool(bool),
    /// Any integer column
    Int(i64),
    /// Any floating point column
    Float(f64),
    /// Text
    Text(String),
    /// UUID (stored natively where the backend supports it)
    Uuid(Uuid),
    /// Timestamp with time zone, normalized to UTC
    Timestamp(DateTime<Utc>),
    /// Structured JSON document
    Json(serde_json::Value),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl Value {
    /// Whether this is `NULL`
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type name for error messages
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamp",
            Self::Json(_) => "json",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Integer view
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Boolean view
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Text view
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// JSON representation used when decoding records into caller types
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(value) => serde_json::Value::Bool(*value),
            Self::Int(value) => serde_json::Value::from(*value),
            Self::Float(value) => serde_json::Number::from_f64(*value)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Text(value) => serde_json::Value::String(value.clone()),
            Self::Uuid(value) => serde_json::Value::String(value.to_string()),
            Self::Timestamp(value) => {
                serde_json::Value::String(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Json(value) => value.clone(),
            Self::Bytes(value) => {
                serde_json::Value::Array(value.iter().map(|b| serde_json::Value::from(*b)).collect())
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(int) = n.as_i64() {
                    Self::Int(int)
                } else if let Some(float) = n.as_f64() {
                    Self::Float(float)
                } else {
                    Self::Json(serde_json::Value::Number(n))
                }
            }
            serde_json::Value::String(s) => Self::Text(s),
            other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => Self::Json(other),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_option_none_is_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_owned()));
    }

    #[test]
    fn test_json_numbers_prefer_integers() {
        assert_eq!(Value::from(json!(42)), Value::Int(42));
        assert_eq!(Value::from(json!(1.5)), Value::Float(1.5));
        assert_eq!(
            Value::from(json!({"a": 1})),
            Value::Json(json!({"a": 1}))
        );
    }

    #[test]
    fn test_uuid_and_timestamp_render_as_strings() {
        let id = Uuid::nil();
        assert_eq!(
            Value::Uuid(id).to_json(),
            json!("00000000-0000-0000-0000-000000000000")
        );
        let at = DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(Value::Timestamp(at).to_json(), json!("2025-03-01T10:00:00Z"));
    }
}
