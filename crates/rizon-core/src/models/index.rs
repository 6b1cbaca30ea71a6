// ABOUTME: Declarative index descriptors for schema maintenance
// ABOUTME: Names are derived deterministically so creation and removal stay idempotent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::query::SortOrder;

/// An index over one or more columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    /// Indexed columns in key order
    pub keys: Vec<(String, SortOrder)>,
    /// Reject duplicate keys
    pub unique: bool,
    /// Only index rows where every key column is present (non-null)
    pub sparse: bool,
    /// Explicit name; derived from table and keys when absent
    pub name: Option<String>,
}

impl Index {
    /// Ascending index on a single column
    #[must_use]
    pub fn on(column: impl Into<String>) -> Self {
        Self {
            keys: vec![(column.into(), SortOrder::Asc)],
            unique: false,
            sparse: false,
            name: None,
        }
    }

    /// Append another key column
    #[must_use]
    pub fn key(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.keys.push((column.into(), order));
        self
    }

    /// Mark unique
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark sparse
    #[must_use]
    pub const fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    /// Use an explicit name
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The name this index has on `table`
    #[must_use]
    pub fn resolved_name(&self, table: &str) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let mut name = format!("idx_{}", table.replace('.', "_"));
        for (column, _) in &self.keys {
            name.push('_');
            name.push_str(column);
        }
        if self.unique {
            name.push_str("_uniq");
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_name_is_stable() {
        let index = Index::on("email").key("created_at", SortOrder::Desc).unique();
        assert_eq!(index.resolved_name("users"), "idx_users_email_created_at_uniq");
        assert_eq!(index.resolved_name("users"), index.clone().resolved_name("users"));
    }

    #[test]
    fn test_explicit_name_wins() {
        let index = Index::on("email").named("users_email_key");
        assert_eq!(index.resolved_name("public.users"), "users_email_key");
        assert_eq!(Index::on("id").resolved_name("public.users"), "idx_public_users_id");
    }
}
