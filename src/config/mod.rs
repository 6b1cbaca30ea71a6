// ABOUTME: Configuration management module for connection and pool settings
// ABOUTME: Loads database configuration from environment variables with strict validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Database connection, pool and statement settings
pub mod database;

pub use database::{DatabaseConfig, DatabaseUrl, PoolConfig, SqlxConfig};
