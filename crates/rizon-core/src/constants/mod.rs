// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Pool defaults, filter grammar suffixes and environment variable names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped into logical domains rather than being in a single
//! flat namespace.

/// Service identification
pub mod service_names {
    /// Service name used in structured logs
    pub const RIZON_DATASTORE: &str = "rizon-datastore";
}

/// Connection pool and statement defaults
pub mod database {
    /// Number of connection attempts at startup before giving up
    pub const CONNECTION_RETRIES: u32 = 5;
    /// Initial retry delay in milliseconds (doubles with each attempt)
    pub const INITIAL_RETRY_DELAY_MS: u64 = 500;
    /// Upper bound for the retry delay in milliseconds
    pub const MAX_RETRY_DELAY_MS: u64 = 30_000;
    /// Default maximum pool size
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    /// Default minimum pool size
    pub const DEFAULT_MIN_CONNECTIONS: u32 = 2;
    /// Default connection acquire timeout in seconds
    pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
    /// Default upper bound for a single statement in milliseconds
    pub const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 30_000;
    /// Default attempts for `retry_transaction`
    pub const TRANSACTION_RETRIES: u32 = 3;
}

/// Legacy string-keyed filter grammar
///
/// A filter key is a column name optionally followed by exactly one of these
/// suffixes. Real column names must never end in one of them.
pub mod filters {
    /// `column IN (...)`
    pub const SUFFIX_IN: &str = "__in";
    /// `column != value`
    pub const SUFFIX_NOT_EQUALS: &str = "__ne";
    /// `column IS NULL`
    pub const SUFFIX_IS_NULL: &str = "__is_null";
    /// `column IS NOT NULL`
    pub const SUFFIX_IS_NOT_NULL: &str = "__is_not_null";
    /// `column > value`
    pub const SUFFIX_GREATER_THAN: &str = "__gt";
    /// `column >= value`
    pub const SUFFIX_GREATER_OR_EQUAL: &str = "__gte";
    /// `column < value`
    pub const SUFFIX_LESS_THAN: &str = "__lt";
    /// `column <= value`
    pub const SUFFIX_LESS_OR_EQUAL: &str = "__lte";
    /// `column LIKE pattern`
    pub const SUFFIX_LIKE: &str = "__like";

    /// Every reserved suffix
    pub const RESERVED_SUFFIXES: &[&str] = &[
        SUFFIX_IS_NOT_NULL,
        SUFFIX_IS_NULL,
        SUFFIX_IN,
        SUFFIX_NOT_EQUALS,
        SUFFIX_GREATER_OR_EQUAL,
        SUFFIX_GREATER_THAN,
        SUFFIX_LESS_OR_EQUAL,
        SUFFIX_LESS_THAN,
        SUFFIX_LIKE,
    ];
}

/// Relation expansion naming
pub mod relations {
    /// Separator between relation alias and column in projected names (`author__name`)
    pub const COLUMN_SEPARATOR: &str = "__";
}

/// Environment variable names read by the configuration layer
pub mod env_config {
    /// Primary connection string variable
    pub const SQL_DATABASE_URL: &str = "SQL_DATABASE_URL";
    /// Fallback connection string variable
    pub const DATABASE_URL: &str = "DATABASE_URL";
    /// Deployment environment (`production` disables query logging)
    pub const ENV: &str = "ENV";
    /// Per-statement timeout in milliseconds (0 disables)
    pub const DB_STATEMENT_TIMEOUT_MS: &str = "DB_STATEMENT_TIMEOUT_MS";
    /// Force query logging on or off
    pub const DB_LOG_QUERIES: &str = "DB_LOG_QUERIES";
    /// Maximum pool size
    pub const DB_MAX_CONNECTIONS: &str = "DB_MAX_CONNECTIONS";
    /// Minimum pool size
    pub const DB_MIN_CONNECTIONS: &str = "DB_MIN_CONNECTIONS";
    /// Pool acquire timeout in seconds
    pub const DB_ACQUIRE_TIMEOUT: &str = "DB_ACQUIRE_TIMEOUT";
    /// Startup connection attempts
    pub const DB_CONNECTION_RETRIES: &str = "DB_CONNECTION_RETRIES";
    /// Initial startup retry delay in milliseconds
    pub const DB_INITIAL_RETRY_DELAY_MS: &str = "DB_INITIAL_RETRY_DELAY_MS";
    /// Maximum startup retry delay in milliseconds
    pub const DB_MAX_RETRY_DELAY_MS: &str = "DB_MAX_RETRY_DELAY_MS";
}
