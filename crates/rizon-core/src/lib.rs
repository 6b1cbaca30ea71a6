// ABOUTME: Core types for the Rizon storage-agnostic data-access layer
// ABOUTME: Foundation crate with errors, constants, values, records, query options and indexes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # Rizon Core
//!
//! Foundation crate providing the backend-neutral vocabulary of the Rizon
//! data-access layer. Nothing in here talks to a database; the types describe
//! what to read or write and how failures are classified, and the adapters in
//! the main crate translate them into executable statements.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and the branchable `ErrorCode`
//! - **constants**: Pool defaults, reserved filter suffixes and environment variable names
//! - **models**: `Value`, `Record`, `QueryOption`, `Filter`, `Index` and relation descriptors

/// Unified error handling system with stable error kinds
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Query option, record, value and index models
pub mod models;
