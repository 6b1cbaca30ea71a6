// ABOUTME: Statement execution wrapper applying the per-statement timeout and query logging
// ABOUTME: Logs SQL text and elapsed time only; bound values never reach the log
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::query_builder::Statement;
use crate::config::database::DatabaseConfig;
use crate::errors::{AppError, AppResult};
use rizon_core::constants::database::DEFAULT_STATEMENT_TIMEOUT_MS;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Per-store execution settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Upper bound on a single statement; `None` waits indefinitely
    pub statement_timeout: Option<Duration>,
    /// Emit a debug event per statement with its SQL text and duration
    pub log_queries: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            statement_timeout: Some(Duration::from_millis(DEFAULT_STATEMENT_TIMEOUT_MS)),
            log_queries: false,
        }
    }
}

impl StoreOptions {
    /// Settings carried by a loaded configuration
    #[must_use]
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            statement_timeout: config.statement_timeout(),
            log_queries: config.log_queries,
        }
    }

    /// Override the statement timeout
    #[must_use]
    pub const fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// Toggle query logging
    #[must_use]
    pub const fn with_log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }
}

/// Drive one statement to completion under the store's timeout
///
/// # Errors
///
/// Returns `Connectivity` when the timeout elapses, otherwise the classified
/// driver error
pub async fn run_statement<T, F>(
    options: &StoreOptions,
    backend: &'static str,
    statement: &Statement,
    execution: F,
) -> AppResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>> + Send,
{
    let started = Instant::now();
    let outcome = match options.statement_timeout {
        Some(limit) => match timeout(limit, execution).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    backend,
                    timeout_ms = limit.as_millis(),
                    sql = %statement.sql,
                    "Statement timed out"
                );
                return Err(AppError::connectivity(format!(
                    "statement exceeded the {}ms timeout",
                    limit.as_millis()
                )));
            }
        },
        None => execution.await,
    };

    if options.log_queries {
        debug!(
            backend,
            elapsed_ms = started.elapsed().as_millis(),
            params = statement.params.len(),
            ok = outcome.is_ok(),
            sql = %statement.sql,
            "Query executed"
        );
    }

    outcome.map_err(|e| {
        let error = AppError::from(e);
        debug!(backend, code = ?error.code, error = %error, "Statement failed");
        error
    })
}
