// ABOUTME: Input validation shared by the SQL statement builder and both backends
// ABOUTME: Rejects malformed identifiers before any statement reaches the database

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Input validation logic shared across database implementations
//!
//! Identifiers are the only caller input that ends up in statement text, so
//! they are held to a strict grammar: one or two dot-separated parts, each
//! `[A-Za-z_][A-Za-z0-9_]*`. Column names may not end in a reserved filter
//! suffix, which keeps the string-keyed filter grammar unambiguous.

use crate::errors::{AppError, AppResult};
use rizon_core::constants::filters::RESERVED_SUFFIXES;

/// Validate a target (table) name, optionally schema-qualified
///
/// # Errors
/// * Returns `InvalidQuery` if the name is empty or not a plain identifier
///
/// # Examples
/// ```
/// # use rizon_datastore::database_plugins::shared::validation::validate_target;
/// assert!(validate_target("users").is_ok());
/// assert!(validate_target("public.users").is_ok());
/// assert!(validate_target("").is_err());
/// assert!(validate_target("users; DROP TABLE users").is_err());
/// ```
pub fn validate_target(target: &str) -> AppResult<()> {
    if target.is_empty() {
        return Err(AppError::invalid_query("target must not be empty"));
    }
    validate_path(target, "target")
}

/// Validate a table alias
///
/// # Errors
/// * Returns `InvalidQuery` if the alias is empty or contains anything but a single identifier
pub fn validate_alias(alias: &str) -> AppResult<()> {
    if alias.is_empty() {
        return Err(AppError::invalid_query("alias must not be empty"));
    }
    if !is_identifier(alias) {
        return Err(AppError::invalid_query(format!("invalid alias '{alias}'")));
    }
    Ok(())
}

/// Validate a column reference, optionally qualified with an alias (`o.amount`)
///
/// # Errors
/// * Returns `InvalidQuery` for empty names, malformed identifiers, or names
///   ending in a reserved filter suffix
///
/// # Examples
/// ```
/// # use rizon_datastore::database_plugins::shared::validation::validate_column;
/// assert!(validate_column("status").is_ok());
/// assert!(validate_column("o.amount").is_ok());
/// assert!(validate_column("status__ne").is_err());
/// ```
pub fn validate_column(column: &str) -> AppResult<()> {
    if column.is_empty() {
        return Err(AppError::invalid_query("column name must not be empty"));
    }
    validate_path(column, "column")?;
    if let Some(suffix) = RESERVED_SUFFIXES
        .iter()
        .find(|suffix| column.ends_with(*suffix))
    {
        return Err(AppError::invalid_query(format!(
            "column '{column}' ends in the reserved filter suffix '{suffix}'"
        )));
    }
    Ok(())
}

/// Validate the output name of an aggregate, relation or join projection
///
/// # Errors
/// * Returns `InvalidQuery` if the name is not a single identifier
pub fn validate_output_name(name: &str) -> AppResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(AppError::invalid_query(format!(
            "invalid output name '{name}'"
        )))
    }
}

fn validate_path(path: &str, what: &str) -> AppResult<()> {
    let mut parts = 0;
    for part in path.split('.') {
        parts += 1;
        if !is_identifier(part) {
            return Err(AppError::invalid_query(format!("invalid {what} '{path}'")));
        }
    }
    if parts > 2 {
        return Err(AppError::invalid_query(format!(
            "{what} '{path}' has too many qualifiers"
        )));
    }
    Ok(())
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_alias_must_be_single_identifier() {
        assert!(validate_alias("u").is_ok());
        assert_eq!(
            validate_alias("").unwrap_err().kind(),
            ErrorCode::InvalidQuery
        );
        assert!(validate_alias("u.x").is_err());
        assert!(validate_alias("1u").is_err());
    }

    #[test]
    fn test_column_rejects_injection_and_reserved_suffixes() {
        assert!(validate_column("name\" OR 1=1 --").is_err());
        assert!(validate_column("a.b.c").is_err());
        assert!(validate_column("deleted_at__is_null").is_err());
        assert!(validate_column("tags__in").is_err());
        assert!(validate_column("line_item").is_ok());
        assert!(validate_column("_private").is_ok());
    }

    #[test]
    fn test_output_name() {
        assert!(validate_output_name("total").is_ok());
        assert!(validate_output_name("sum(x)").is_err());
    }
}
