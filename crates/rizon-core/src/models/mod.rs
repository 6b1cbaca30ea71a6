// ABOUTME: Backend-neutral data models for the data-access layer
// ABOUTME: Values, records, query options, index descriptors and relation metadata
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Backend-neutral scalar bound into statements and decoded from rows
pub mod value;

/// Ordered column/value maps used for writes and decoded rows
pub mod record;

/// Filters, sorting, joins, grouping and pagination
pub mod query;

/// Declarative index descriptors
pub mod index;

/// Named relations available for eager expansion
pub mod relation;

pub use index::Index;
pub use query::{
    AggregateExpr, AggregateFn, CompareOp, Condition, Filter, FilterOp, Having, JoinKind, JoinOn,
    JoinOption, QueryOption, SortOrder,
};
pub use record::{IntoRecord, Record};
pub use relation::{Relation, RelationRegistry};
pub use value::Value;
