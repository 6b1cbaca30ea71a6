// ABOUTME: Unified error type and stable error codes for every data-access operation
// ABOUTME: Callers branch on ErrorCode while the backend cause stays reachable via source()
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Unified Error Handling System
//!
//! Every `DataStore` operation fails with an [`AppError`]. The [`ErrorCode`] is
//! the stable kind callers react to (retry connectivity failures, surface
//! validation failures to users, map not-found to an empty response). The
//! message is for humans, and the original backend error is kept as the
//! `source()` so diagnostics never lose the driver's text.

/// Conversion from `sqlx::Error` into the error taxonomy
#[cfg(feature = "database-errors")]
pub mod database;

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Standard error codes used by the data-access layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Query construction (3000-3999)
    /// The query options or arguments are malformed
    #[serde(rename = "INVALID_QUERY")]
    InvalidQuery = 3000,

    // Resources (4000-4999)
    /// No row matched where exactly one was required
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound = 4000,
    /// A unique, foreign-key, not-null or check constraint rejected the write
    #[serde(rename = "CONSTRAINT_VIOLATION")]
    ConstraintViolation = 4001,
    /// A transaction handle was used after it was committed or rolled back
    #[serde(rename = "TRANSACTION_CONFLICT")]
    TransactionConflict = 4002,

    // Backend availability (5000-5999)
    /// Connecting, pinging or talking to the backend failed
    #[serde(rename = "CONNECTIVITY")]
    Connectivity = 5000,

    // Configuration (6000-6999)
    /// Required configuration is missing
    #[serde(rename = "CONFIG_MISSING")]
    ConfigMissing = 6001,
    /// Configuration is present but invalid
    #[serde(rename = "CONFIG_INVALID")]
    ConfigInvalid = 6002,

    // Internal (9000-9999)
    /// Unexpected internal failure
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    /// Backend error that does not fit a more specific kind
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError = 9001,
    /// A row or record could not be decoded into the requested shape
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError = 9003,
}

impl ErrorCode {
    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidQuery => "The query could not be constructed",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ConstraintViolation => "The write violates a data constraint",
            Self::TransactionConflict => "The transaction handle is no longer usable",
            Self::Connectivity => "The database is unreachable",
            Self::ConfigMissing => "Required configuration is missing",
            Self::ConfigInvalid => "Configuration is invalid",
            Self::InternalError => "An internal error occurred",
            Self::DatabaseError => "Database operation failed",
            Self::SerializationError => "Data serialization/deserialization failed",
        }
    }

    /// Whether retrying the same operation later may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity)
    }
}

/// Unified error type for the data-access layer
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Prefix the message with what was being attempted, keeping the kind
    #[must_use]
    pub fn with_context(mut self, context: &str) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }

    /// The stable kind callers branch on
    #[must_use]
    pub const fn kind(&self) -> ErrorCode {
        self.code
    }

    /// Whether retrying the same operation later may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Convenience functions for creating common errors
impl AppError {
    /// Resource not found
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Malformed query options or arguments
    #[must_use]
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidQuery, message)
    }

    /// Constraint violation reported by the backend
    #[must_use]
    pub fn constraint_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConstraintViolation, message)
    }

    /// Backend unreachable or transport failure
    #[must_use]
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Connectivity, message)
    }

    /// Transaction handle misuse
    #[must_use]
    pub fn transaction_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TransactionConflict, message)
    }

    /// Unclassified backend error
    #[must_use]
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Decode/encode failure
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message)
    }

    /// Missing configuration value
    #[must_use]
    pub fn config_missing(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigMissing, message)
    }

    /// Invalid configuration value
    #[must_use]
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, message)
    }

    /// Internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(error.to_string()).with_source(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_only_connectivity_is_retryable() {
        assert!(ErrorCode::Connectivity.is_retryable());
        assert!(!ErrorCode::InvalidQuery.is_retryable());
        assert!(!ErrorCode::ConstraintViolation.is_retryable());
        assert!(!ErrorCode::ResourceNotFound.is_retryable());
    }

    #[test]
    fn test_display_includes_description_and_message() {
        let error = AppError::invalid_query("alias must not be empty");
        assert_eq!(error.kind(), ErrorCode::InvalidQuery);
        assert_eq!(
            error.to_string(),
            "The query could not be constructed: alias must not be empty"
        );
    }

    #[test]
    fn test_source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error = AppError::connectivity("ping failed").with_source(io);
        let source = error.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("refused"));
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::ConstraintViolation).unwrap();
        assert_eq!(json, "\"CONSTRAINT_VIOLATION\"");
    }
}
