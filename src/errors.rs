// ABOUTME: Error types for the data-access layer
// ABOUTME: Re-exports the shared taxonomy from rizon-core so callers import from one place
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Unified Error Handling
//!
//! Every operation returns [`AppResult`]. Callers branch on
//! [`AppError::kind`] rather than on message text; driver errors are
//! classified when they cross the `sqlx` boundary.

pub use rizon_core::errors::{AppError, AppResult, ErrorCode};
