// ABOUTME: Classification of sqlx errors into the stable data-access error kinds
// ABOUTME: Keeps the driver error as the source so diagnostics are never lost
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{AppError, ErrorCode};
use sqlx::error::ErrorKind;
use sqlx::Error as SqlxError;

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        let (code, message) = classify(&error);
        Self::new(code, message).with_source(error)
    }
}

fn classify(error: &SqlxError) -> (ErrorCode, String) {
    match error {
        SqlxError::RowNotFound => (ErrorCode::ResourceNotFound, "no rows returned".to_owned()),
        SqlxError::Database(db_error) => {
            let code = match db_error.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => ErrorCode::ConstraintViolation,
                _ => ErrorCode::DatabaseError,
            };
            let message = match db_error.constraint() {
                Some(constraint) => format!("{} (constraint {constraint})", db_error.message()),
                None => db_error.message().to_owned(),
            };
            (code, message)
        }
        SqlxError::PoolTimedOut => (
            ErrorCode::Connectivity,
            "timed out acquiring a pooled connection".to_owned(),
        ),
        SqlxError::PoolClosed => (
            ErrorCode::Connectivity,
            "connection pool is closed".to_owned(),
        ),
        SqlxError::Io(e) => (ErrorCode::Connectivity, format!("I/O failure: {e}")),
        SqlxError::Tls(e) => (ErrorCode::Connectivity, format!("TLS failure: {e}")),
        SqlxError::Protocol(message) => (
            ErrorCode::Connectivity,
            format!("protocol failure: {message}"),
        ),
        SqlxError::WorkerCrashed => (
            ErrorCode::Connectivity,
            "database worker crashed".to_owned(),
        ),
        SqlxError::Configuration(e) => (
            ErrorCode::ConfigInvalid,
            format!("invalid connection configuration: {e}"),
        ),
        SqlxError::ColumnDecode { index, source } => (
            ErrorCode::SerializationError,
            format!("failed to decode column {index}: {source}"),
        ),
        SqlxError::Decode(e) => (
            ErrorCode::SerializationError,
            format!("failed to decode value: {e}"),
        ),
        SqlxError::ColumnNotFound(name) => (
            ErrorCode::SerializationError,
            format!("column '{name}' not present in result"),
        ),
        SqlxError::TypeNotFound { type_name } => (
            ErrorCode::SerializationError,
            format!("unknown database type '{type_name}'"),
        ),
        other => (ErrorCode::DatabaseError, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let error = AppError::from(SqlxError::RowNotFound);
        assert_eq!(error.kind(), ErrorCode::ResourceNotFound);
        assert!(error.source().is_some());
    }

    #[test]
    fn test_pool_failures_are_connectivity() {
        assert_eq!(
            AppError::from(SqlxError::PoolClosed).kind(),
            ErrorCode::Connectivity
        );
        assert_eq!(
            AppError::from(SqlxError::PoolTimedOut).kind(),
            ErrorCode::Connectivity
        );
        assert!(AppError::from(SqlxError::WorkerCrashed).is_retryable());
    }

    #[test]
    fn test_decode_failures_are_serialization() {
        let error = AppError::from(SqlxError::ColumnNotFound("email".to_owned()));
        assert_eq!(error.kind(), ErrorCode::SerializationError);
        assert!(error.message.contains("email"));
    }
}
