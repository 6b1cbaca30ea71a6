// ABOUTME: Shared database logic for the PostgreSQL and SQLite backends
// ABOUTME: Statement compilation, parameter binding, row mapping, execution and transactions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Identifier validation (targets, aliases, columns, output names)
pub mod validation;

/// Query options compiled to parameterized SQL per dialect
pub mod query_builder;

/// Parameter binding helpers (one `.bind()` per placeholder, per backend)
pub mod builders;

/// SQL row to `Record` conversion
pub mod mappers;

/// Statement timeout and query logging
pub mod execution;

/// Transaction guards and retry patterns (lock contention, exponential backoff)
pub mod transactions;
