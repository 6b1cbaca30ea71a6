// ABOUTME: Transaction management with RAII guards and retry patterns for database operations.
// ABOUTME: Serializes statements on one transaction and rolls back automatically when dropped.

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Transaction management with RAII guards and retry patterns
//!
//! - `TransactionGuard`: owns an open `SQLx` transaction; statements issued
//!   through it run one at a time, and dropping it uncommitted rolls back
//! - `retry_transaction`: exponential backoff around a whole unit of work
//!
//! ```text
//! use rizon_datastore::database_plugins::shared::transactions::retry_transaction;
//!
//! let moved = retry_transaction(|| async {
//!     store.run_in_transaction(|tx| Box::pin(async move {
//!         tx.update("accounts", &debit, &debit_changes).await?;
//!         tx.update("accounts", &credit, &credit_changes).await
//!     })).await
//! }, 3).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use sqlx::{Database, Transaction};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::errors::{AppError, AppResult, ErrorCode};

/// Retry a unit of work if it fails with a transient error
///
/// Connectivity failures (timeouts, dropped connections, pool exhaustion) are
/// retried, as are database errors reporting lock contention: `SQLite`
/// "database is locked", `PostgreSQL` deadlocks and serialization failures.
/// Everything else is returned immediately.
///
/// Backoff starts at 10ms and doubles per attempt.
///
/// # Errors
///
/// Returns the last error once `max_retries` attempts are exhausted, or the
/// first non-retryable error
pub async fn retry_transaction<F, Fut, T>(mut f: F, max_retries: u32) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempts = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempts += 1;
                if attempts >= max_retries {
                    error!(
                        attempts = attempts,
                        max_retries = max_retries,
                        error = %e,
                        "Transaction failed after max retries"
                    );
                    return Err(e);
                }

                if is_retryable_error(&e) {
                    let backoff_ms = 10_u64 << attempts.min(12);
                    warn!(
                        attempt = attempts,
                        max_retries = max_retries,
                        backoff_ms = backoff_ms,
                        error = %e,
                        "Transaction failed with retryable error, retrying after backoff"
                    );
                    sleep(Duration::from_millis(backoff_ms)).await;
                } else {
                    error!(
                        attempts = attempts,
                        error = %e,
                        "Transaction failed with non-retryable error"
                    );
                    return Err(e);
                }
            }
        }
    }
}

fn is_retryable_error(error: &AppError) -> bool {
    if error.is_retryable() {
        return true;
    }
    if error.kind() != ErrorCode::DatabaseError {
        return false;
    }
    let message = error.to_string().to_lowercase();
    message.contains("deadlock")
        || message.contains("database is locked")
        || message.contains("busy")
        || message.contains("could not serialize")
        || message.contains("serialization failure")
}

/// Delay before connection attempt `attempt` (zero-based), doubling from
/// `initial_ms` and capped at `max_ms`
#[must_use]
pub fn backoff_delay(attempt: u32, initial_ms: u64, max_ms: u64) -> Duration {
    let factor = 1_u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(initial_ms.saturating_mul(factor).min(max_ms))
}

/// Open `SQLx` transaction shared by reference across the statements of a unit of work
///
/// Statements hold [`TransactionGuard::lock`] while they run, which
/// serializes them. `commit` and `rollback` consume the guard; dropping
/// it without either rolls back.
pub struct TransactionGuard<DB: Database> {
    transaction: Mutex<Option<Transaction<'static, DB>>>,
    backend: &'static str,
}

impl<DB: Database> TransactionGuard<DB> {
    /// Wrap a transaction obtained from `pool.begin()`
    #[must_use]
    pub fn new(transaction: Transaction<'static, DB>, backend: &'static str) -> Self {
        debug!(backend, "Transaction started");
        Self {
            transaction: Mutex::new(Some(transaction)),
            backend,
        }
    }

    /// Exclusive access to the transaction slot; hold it for the whole statement
    pub async fn lock(&self) -> MutexGuard<'_, Option<Transaction<'static, DB>>> {
        self.transaction.lock().await
    }

    /// Connection of a locked, still-open transaction
    ///
    /// ```text
    /// let mut slot = guard.lock().await;
    /// sqlx::query("INSERT INTO ...").execute(SqliteTransactionGuard::executor(&mut slot)?).await?;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `TransactionConflict` if the transaction has already ended
    pub fn executor<'g>(
        slot: &'g mut Option<Transaction<'static, DB>>,
    ) -> AppResult<&'g mut <DB as Database>::Connection> {
        slot.as_deref_mut().ok_or_else(|| {
            AppError::transaction_conflict("transaction has already been committed or rolled back")
        })
    }

    /// Commit and consume the guard
    ///
    /// # Errors
    ///
    /// Returns `TransactionConflict` if the transaction already ended, or the
    /// classified driver error if the commit fails
    pub async fn commit(self) -> AppResult<()> {
        let backend = self.backend;
        let tx = self.take()?;
        tx.commit().await.map_err(|e| {
            AppError::from(e).with_context("transaction commit failed")
        })?;
        debug!(backend, "Transaction committed");
        Ok(())
    }

    /// Roll back and consume the guard
    ///
    /// # Errors
    ///
    /// Returns `TransactionConflict` if the transaction already ended, or the
    /// classified driver error if the rollback fails
    pub async fn rollback(self) -> AppResult<()> {
        let backend = self.backend;
        let tx = self.take()?;
        tx.rollback().await.map_err(|e| {
            AppError::from(e).with_context("transaction rollback failed")
        })?;
        debug!(backend, "Transaction rolled back");
        Ok(())
    }

    fn take(mut self) -> AppResult<Transaction<'static, DB>> {
        self.transaction.get_mut().take().ok_or_else(|| {
            AppError::transaction_conflict("transaction has already been committed or rolled back")
        })
    }
}

impl<DB: Database> Drop for TransactionGuard<DB> {
    fn drop(&mut self) {
        if self.transaction.get_mut().is_some() {
            // SQLx rolls back when the inner transaction drops
            warn!(
                backend = self.backend,
                "Transaction dropped without commit - rolling back"
            );
        }
    }
}

/// Type alias for `SQLite` transaction guard
pub type SqliteTransactionGuard = TransactionGuard<sqlx::Sqlite>;

/// Type alias for `PostgreSQL` transaction guard
#[cfg(feature = "postgresql")]
pub type PostgresTransactionGuard = TransactionGuard<sqlx::Postgres>;
