// ABOUTME: Named relations that expand into joins and projections without caller-authored SQL
// ABOUTME: The registry is built once at startup and read concurrently afterwards
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::query::JoinKind;
use std::collections::HashMap;

/// A relation from a target entity to another table
///
/// Expanding `author` on `posts AS p` emits
/// `LEFT JOIN "users" AS "author" ON "p"."author_id" = "author"."id"` and
/// projects each listed column as `author__<column>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Name used in `QueryOption::relations`; also the join alias
    pub name: String,
    /// Join flavor
    pub kind: JoinKind,
    /// Related table
    pub table: String,
    /// Column on the target entity
    pub local_column: String,
    /// Column on the related table
    pub foreign_column: String,
    /// Related columns to project
    pub columns: Vec<String>,
}

impl Relation {
    /// Describe a `LEFT JOIN` relation
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        local_column: impl Into<String>,
        foreign_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: JoinKind::Left,
            table: table.into(),
            local_column: local_column.into(),
            foreign_column: foreign_column.into(),
            columns: Vec::new(),
        }
    }

    /// Use a different join flavor
    #[must_use]
    pub const fn kind(mut self, kind: JoinKind) -> Self {
        self.kind = kind;
        self
    }

    /// Project a related column
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }
}

/// Relations known per target entity
#[derive(Debug, Clone, Default)]
pub struct RelationRegistry {
    by_target: HashMap<String, Vec<Relation>>,
}

impl RelationRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relation for `target`, replacing one with the same name
    #[must_use]
    pub fn with(mut self, target: impl Into<String>, relation: Relation) -> Self {
        let relations = self.by_target.entry(target.into()).or_default();
        relations.retain(|existing| existing.name != relation.name);
        relations.push(relation);
        self
    }

    /// Look up a relation by target and name
    #[must_use]
    pub fn get(&self, target: &str, name: &str) -> Option<&Relation> {
        self.by_target
            .get(target)?
            .iter()
            .find(|relation| relation.name == name)
    }

    /// Whether any relation is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }
}
