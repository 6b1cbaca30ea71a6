// ABOUTME: Translates query options, records and index descriptors into parameterized SQL
// ABOUTME: Clause order is fixed so generated statements are reproducible across runs

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Statement builder shared by the `SQLite` and `PostgreSQL` adapters
//!
//! A `SELECT` is emitted in this order:
//!
//! 1. base projection (`"alias".*`, or the grouping columns), then the selected columns
//! 2. aggregate projections, relation projections, explicit join projections
//! 3. `FROM target AS alias`, relation joins, explicit joins (in the order supplied)
//! 4. `WHERE` conditions ANDed in filter order
//! 5. `GROUP BY` / `HAVING`
//! 6. `ORDER BY` keys in the order supplied
//! 7. `LIMIT`, then `OFFSET`
//!
//! Identifiers are validated and quoted; every value, including limits and
//! offsets, is a bound parameter. The only literal ever written for a value is
//! `NULL`.

use super::validation::{
    validate_alias, validate_column, validate_output_name, validate_target,
};
use crate::errors::{AppError, AppResult};
use rizon_core::constants::relations::COLUMN_SEPARATOR;
use rizon_core::models::{
    AggregateExpr, Condition, Filter, FilterOp, Index, QueryOption, Record, Relation,
    RelationRegistry, Value,
};
use std::fmt::Write as _;
use std::mem;
use std::sync::Arc;

/// SQL flavor spoken by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `PostgreSQL`: numbered `$n` placeholders
    Postgres,
    /// `SQLite`: positional `?` placeholders
    Sqlite,
}

impl Dialect {
    /// Human-readable backend name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Postgres => "PostgreSQL",
            Self::Sqlite => "SQLite",
        }
    }

    fn write_placeholder(self, sql: &mut String, index: usize) {
        match self {
            Self::Postgres => {
                let _ = write!(sql, "${index}");
            }
            Self::Sqlite => sql.push('?'),
        }
    }
}

/// SQL text plus the values bound to its placeholders, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Statement text
    pub sql: String,
    /// Bound parameters
    pub params: Vec<Value>,
}

impl Statement {
    /// Wrap caller-authored SQL and its parameters
    #[must_use]
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

struct SqlWriter {
    dialect: Dialect,
    sql: String,
    params: Vec<Value>,
}

impl SqlWriter {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(128),
            params: Vec::new(),
        }
    }

    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    /// Quote a validated, possibly qualified, identifier
    fn push_ident(&mut self, path: &str) {
        for (i, part) in path.split('.').enumerate() {
            if i > 0 {
                self.sql.push('.');
            }
            self.sql.push('"');
            self.sql.push_str(part);
            self.sql.push('"');
        }
    }

    /// Column reference, qualified with `qualifier` unless already qualified
    fn push_column(&mut self, qualifier: Option<&str>, column: &str) {
        match qualifier {
            Some(alias) if !column.contains('.') => {
                self.push_ident(alias);
                self.sql.push('.');
                self.push_ident(column);
            }
            _ => self.push_ident(column),
        }
    }

    fn push_value(&mut self, value: &Value) {
        if value.is_null() {
            self.sql.push_str("NULL");
        } else {
            self.params.push(value.clone());
            self.dialect.write_placeholder(&mut self.sql, self.params.len());
        }
    }

    fn push_count(&mut self, count: u64, what: &str) -> AppResult<()> {
        let bound = i64::try_from(count)
            .map_err(|_| AppError::invalid_query(format!("{what} {count} is out of range")))?;
        self.push_value(&Value::Int(bound));
        Ok(())
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Which projection a `SELECT` carries
#[derive(Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// Rows as the caller asked for them, ordered and paginated
    Rows { limit: u64 },
    /// The same rows without ordering or pagination, for counting
    CountBasis,
}

/// Builds statements for one dialect
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    dialect: Dialect,
    relations: Arc<RelationRegistry>,
}

impl StatementBuilder {
    /// Builder without registered relations
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            relations: Arc::new(RelationRegistry::new()),
        }
    }

    /// Replace the relation registry
    #[must_use]
    pub fn with_relations(mut self, relations: RelationRegistry) -> Self {
        self.relations = Arc::new(relations);
        self
    }

    /// Dialect in use
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// `SELECT` honoring every option
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for empty target/alias, malformed identifiers,
    /// unknown relations, joins without conditions, or comparisons against null
    pub fn select(&self, target: &str, alias: &str, options: &QueryOption) -> AppResult<Statement> {
        let mut w = SqlWriter::new(self.dialect);
        self.write_select(&mut w, target, alias, options, Shape::Rows { limit: options.limit })?;
        Ok(w.finish())
    }

    /// `SELECT` returning at most one row (`skip` still applies)
    ///
    /// # Errors
    ///
    /// Same as [`StatementBuilder::select`]
    pub fn select_one(
        &self,
        target: &str,
        alias: &str,
        options: &QueryOption,
    ) -> AppResult<Statement> {
        let mut w = SqlWriter::new(self.dialect);
        self.write_select(&mut w, target, alias, options, Shape::Rows { limit: 1 })?;
        Ok(w.finish())
    }

    /// `SELECT COUNT(*)` honoring filters, joins, grouping and distinct but not
    /// pagination; the count is returned in column `count`
    ///
    /// With `distinct`, grouping or aggregates the unpaginated
    /// [`StatementBuilder::select`] is counted as a subquery, so the count
    /// matches the rows it returns.
    ///
    /// # Errors
    ///
    /// Same as [`StatementBuilder::select`]
    pub fn count(&self, target: &str, alias: &str, options: &QueryOption) -> AppResult<Statement> {
        let mut w = SqlWriter::new(self.dialect);
        w.push("SELECT COUNT(*) AS \"count\"");
        if options.distinct || !options.group.is_empty() || !options.aggregates.is_empty() {
            w.push(" FROM (");
            self.write_select(&mut w, target, alias, options, Shape::CountBasis)?;
            w.push(") AS \"counted\"");
        } else {
            validate_target(target)?;
            validate_alias(alias)?;
            let relations = self.resolve_relations(target, options)?;
            Self::write_from(&mut w, target, alias, &relations, options)?;
            Self::write_where(&mut w, Some(alias), &options.filter)?;
        }
        Ok(w.finish())
    }

    /// `SELECT DISTINCT field FROM target WHERE ...`, ordered by the field
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for malformed identifiers
    pub fn distinct(&self, target: &str, field: &str, filter: &Filter) -> AppResult<Statement> {
        validate_target(target)?;
        validate_column(field)?;
        let mut w = SqlWriter::new(self.dialect);
        w.push("SELECT DISTINCT ");
        w.push_ident(field);
        w.push(" FROM ");
        w.push_ident(target);
        Self::write_where(&mut w, None, filter)?;
        w.push(" ORDER BY ");
        w.push_ident(field);
        Ok(w.finish())
    }

    /// `INSERT` of one record (`DEFAULT VALUES` when the record is empty)
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for malformed identifiers
    pub fn insert(&self, target: &str, record: &Record) -> AppResult<Statement> {
        validate_target(target)?;
        let mut w = SqlWriter::new(self.dialect);
        w.push("INSERT INTO ");
        w.push_ident(target);
        if record.is_empty() {
            w.push(" DEFAULT VALUES");
            return Ok(w.finish());
        }
        let columns: Vec<&str> = record.columns().collect();
        Self::write_insert_columns(&mut w, &columns)?;
        w.push(" VALUES ");
        Self::write_row(&mut w, &columns, record)?;
        Ok(w.finish())
    }

    /// Multi-row `INSERT`; `None` when there is nothing to insert
    ///
    /// Every record must carry the same set of columns; values are emitted in
    /// the column order of the first record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for malformed identifiers, empty records, or
    /// records whose column sets differ
    pub fn insert_many(&self, target: &str, records: &[Record]) -> AppResult<Option<Statement>> {
        validate_target(target)?;
        let Some(first) = records.first() else {
            return Ok(None);
        };
        if first.is_empty() {
            return Err(AppError::invalid_query(
                "batch insert records must carry at least one column",
            ));
        }
        let columns: Vec<&str> = first.columns().collect();
        let mut w = SqlWriter::new(self.dialect);
        w.push("INSERT INTO ");
        w.push_ident(target);
        Self::write_insert_columns(&mut w, &columns)?;
        w.push(" VALUES ");
        for (i, record) in records.iter().enumerate() {
            if record.len() != columns.len() {
                return Err(AppError::invalid_query(format!(
                    "batch insert record {i} has {} columns, expected {}",
                    record.len(),
                    columns.len()
                )));
            }
            if i > 0 {
                w.push(", ");
            }
            Self::write_row(&mut w, &columns, record)?;
        }
        Ok(Some(w.finish()))
    }

    /// `UPDATE target SET <changes> WHERE <filter>`
    ///
    /// Only the columns present in `changes` are written.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` if `changes` is empty or an identifier is malformed
    pub fn update(&self, target: &str, filter: &Filter, changes: &Record) -> AppResult<Statement> {
        validate_target(target)?;
        if changes.is_empty() {
            return Err(AppError::invalid_query("update payload has no fields"));
        }
        let mut w = SqlWriter::new(self.dialect);
        w.push("UPDATE ");
        w.push_ident(target);
        w.push(" SET ");
        for (i, (column, value)) in changes.iter().enumerate() {
            validate_column(column)?;
            if i > 0 {
                w.push(", ");
            }
            w.push_ident(column);
            w.push(" = ");
            w.push_value(value);
        }
        Self::write_where(&mut w, None, filter)?;
        Ok(w.finish())
    }

    /// `DELETE FROM target WHERE <filter>`
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for malformed identifiers
    pub fn delete(&self, target: &str, filter: &Filter) -> AppResult<Statement> {
        validate_target(target)?;
        let mut w = SqlWriter::new(self.dialect);
        w.push("DELETE FROM ");
        w.push_ident(target);
        Self::write_where(&mut w, None, filter)?;
        Ok(w.finish())
    }

    /// Atomic insert-or-update keyed on `conflict_key`
    ///
    /// On conflict every other column of the record is overwritten with the
    /// incoming value; a record holding only the key becomes `DO NOTHING`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` if the record is empty or lacks the conflict key
    pub fn upsert(&self, target: &str, conflict_key: &str, record: &Record) -> AppResult<Statement> {
        validate_column(conflict_key)?;
        if conflict_key.contains('.') {
            return Err(AppError::invalid_query(format!(
                "conflict key '{conflict_key}' must be an unqualified column"
            )));
        }
        if !record.contains(conflict_key) {
            return Err(AppError::invalid_query(format!(
                "upsert record does not contain conflict key '{conflict_key}'"
            )));
        }
        let mut statement = self.insert(target, record)?;
        let mut sql = mem::take(&mut statement.sql);
        let _ = write!(sql, " ON CONFLICT (\"{conflict_key}\")");
        let updates: Vec<&str> = record.columns().filter(|c| *c != conflict_key).collect();
        if updates.is_empty() {
            sql.push_str(" DO NOTHING");
        } else {
            sql.push_str(" DO UPDATE SET ");
            for (i, column) in updates.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                let _ = write!(sql, "\"{column}\" = EXCLUDED.\"{column}\"");
            }
        }
        statement.sql = sql;
        Ok(statement)
    }

    /// `CREATE [UNIQUE] INDEX IF NOT EXISTS`; sparse indexes are partial on non-null keys
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` if the index has no keys or an identifier is malformed
    pub fn create_index(&self, target: &str, index: &Index) -> AppResult<Statement> {
        validate_target(target)?;
        if index.keys.is_empty() {
            return Err(AppError::invalid_query("index must have at least one key"));
        }
        let name = index.resolved_name(target);
        validate_output_name(&name)?;
        let (schema, table) = split_schema(target);

        let mut w = SqlWriter::new(self.dialect);
        w.push(if index.unique {
            "CREATE UNIQUE INDEX IF NOT EXISTS "
        } else {
            "CREATE INDEX IF NOT EXISTS "
        });
        match (self.dialect, schema) {
            // SQLite names the schema on the index, not on the table
            (Dialect::Sqlite, Some(schema)) => {
                w.push_ident(schema);
                w.push(".");
                w.push_ident(&name);
                w.push(" ON ");
                w.push_ident(table);
            }
            _ => {
                w.push_ident(&name);
                w.push(" ON ");
                w.push_ident(target);
            }
        }
        w.push(" (");
        for (i, (column, order)) in index.keys.iter().enumerate() {
            validate_column(column)?;
            if i > 0 {
                w.push(", ");
            }
            w.push_ident(column);
            w.push(" ");
            w.push(order.as_sql());
        }
        w.push(")");
        if index.sparse {
            w.push(" WHERE ");
            for (i, (column, _)) in index.keys.iter().enumerate() {
                if i > 0 {
                    w.push(" AND ");
                }
                w.push_ident(column);
                w.push(" IS NOT NULL");
            }
        }
        Ok(w.finish())
    }

    /// `DROP INDEX IF EXISTS`
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for malformed identifiers
    pub fn drop_index(&self, target: &str, index: &Index) -> AppResult<Statement> {
        validate_target(target)?;
        let name = index.resolved_name(target);
        validate_output_name(&name)?;
        let mut w = SqlWriter::new(self.dialect);
        w.push("DROP INDEX IF EXISTS ");
        if let (Some(schema), _) = split_schema(target) {
            w.push_ident(schema);
            w.push(".");
        }
        w.push_ident(&name);
        Ok(w.finish())
    }

    fn resolve_relations<'r>(
        &'r self,
        target: &str,
        options: &QueryOption,
    ) -> AppResult<Vec<&'r Relation>> {
        options
            .relations
            .iter()
            .map(|name| {
                self.relations.get(target, name).ok_or_else(|| {
                    AppError::invalid_query(format!(
                        "relation '{name}' is not registered for '{target}'"
                    ))
                })
            })
            .collect()
    }

    fn write_select(
        &self,
        w: &mut SqlWriter,
        target: &str,
        alias: &str,
        options: &QueryOption,
        shape: Shape,
    ) -> AppResult<()> {
        validate_target(target)?;
        validate_alias(alias)?;
        let relations = self.resolve_relations(target, options)?;

        w.push("SELECT ");
        if options.distinct {
            w.push("DISTINCT ");
        }
        Self::write_projection(w, alias, &relations, options)?;
        Self::write_from(w, target, alias, &relations, options)?;
        Self::write_where(w, Some(alias), &options.filter)?;
        Self::write_grouping(w, alias, options)?;

        if let Shape::Rows { limit } = shape {
            Self::write_order(w, alias, &relations, options)?;
            if limit > 0 {
                w.push(" LIMIT ");
                w.push_count(limit, "limit")?;
            } else if options.skip > 0 && w.dialect == Dialect::Sqlite {
                // SQLite has no OFFSET without LIMIT
                w.push(" LIMIT -1");
            }
            if options.skip > 0 {
                w.push(" OFFSET ");
                w.push_count(options.skip, "skip")?;
            }
        }
        Ok(())
    }

    fn write_projection(
        w: &mut SqlWriter,
        alias: &str,
        relations: &[&Relation],
        options: &QueryOption,
    ) -> AppResult<()> {
        let mut first = true;
        let mut separator = |w: &mut SqlWriter| {
            if !first {
                w.push(", ");
            }
            first = false;
        };

        let mut grouped: &[String] = &[];
        if !options.select_only {
            if !options.group.is_empty() {
                grouped = &options.group;
                for column in grouped {
                    validate_column(column)?;
                    separator(w);
                    w.push_column(Some(alias), column);
                }
            } else if options.aggregates.is_empty() {
                separator(w);
                w.push_ident(alias);
                w.push(".*");
            }
        }
        for column in &options.select {
            validate_column(column)?;
            if grouped.contains(column) {
                continue;
            }
            separator(w);
            w.push_column(Some(alias), column);
        }

        for (aggregate, name) in &options.aggregates {
            validate_output_name(name)?;
            separator(w);
            Self::write_aggregate(w, alias, aggregate)?;
            w.push(" AS ");
            w.push_ident(name);
        }
        for relation in relations {
            for column in &relation.columns {
                validate_column(column)?;
                separator(w);
                Self::write_prefixed_column(w, &relation.name, column);
            }
        }
        for join in &options.join {
            validate_alias(&join.alias)?;
            for column in &join.select {
                validate_column(column)?;
                separator(w);
                Self::write_prefixed_column(w, &join.alias, column);
            }
        }

        if first {
            return Err(AppError::invalid_query(
                "select_only is set but nothing is projected",
            ));
        }
        Ok(())
    }

    /// Output names of the aggregate, relation and join projections
    fn projected_names(relations: &[&Relation], options: &QueryOption) -> Vec<String> {
        let aggregates = options.aggregates.iter().map(|(_, name)| name.clone());
        let related = relations.iter().flat_map(|relation| {
            relation
                .columns
                .iter()
                .map(|column| Self::prefixed_name(&relation.name, column))
        });
        let joined = options.join.iter().flat_map(|join| {
            join.select
                .iter()
                .map(|column| Self::prefixed_name(&join.alias, column))
        });
        aggregates.chain(related).chain(joined).collect()
    }

    fn prefixed_name(alias: &str, column: &str) -> String {
        let bare = column.rsplit('.').next().unwrap_or(column);
        format!("{alias}{COLUMN_SEPARATOR}{bare}")
    }

    /// `"alias"."column" AS "alias__column"`
    fn write_prefixed_column(w: &mut SqlWriter, alias: &str, column: &str) {
        w.push_column(Some(alias), column);
        w.push(" AS ");
        w.push_ident(&Self::prefixed_name(alias, column));
    }

    fn write_from(
        w: &mut SqlWriter,
        target: &str,
        alias: &str,
        relations: &[&Relation],
        options: &QueryOption,
    ) -> AppResult<()> {
        w.push(" FROM ");
        w.push_ident(target);
        w.push(" AS ");
        w.push_ident(alias);

        for relation in relations {
            validate_target(&relation.table)?;
            validate_alias(&relation.name)?;
            validate_column(&relation.local_column)?;
            validate_column(&relation.foreign_column)?;
            w.push(" ");
            w.push(relation.kind.as_sql());
            w.push(" ");
            w.push_ident(&relation.table);
            w.push(" AS ");
            w.push_ident(&relation.name);
            w.push(" ON ");
            w.push_column(Some(alias), &relation.local_column);
            w.push(" = ");
            w.push_column(Some(&relation.name), &relation.foreign_column);
        }

        for join in &options.join {
            validate_target(&join.table)?;
            validate_alias(&join.alias)?;
            if join.on.is_empty() {
                return Err(AppError::invalid_query(format!(
                    "join '{}' has no ON condition",
                    join.alias
                )));
            }
            w.push(" ");
            w.push(join.kind.as_sql());
            w.push(" ");
            w.push_ident(&join.table);
            w.push(" AS ");
            w.push_ident(&join.alias);
            w.push(" ON ");
            for (i, on) in join.on.iter().enumerate() {
                validate_column(&on.left)?;
                validate_column(&on.right)?;
                if i > 0 {
                    w.push(" AND ");
                }
                w.push_column(Some(alias), &on.left);
                w.push(" = ");
                w.push_column(Some(&join.alias), &on.right);
            }
        }
        Ok(())
    }

    fn write_where(w: &mut SqlWriter, qualifier: Option<&str>, filter: &Filter) -> AppResult<()> {
        for (i, condition) in filter.conditions().iter().enumerate() {
            w.push(if i == 0 { " WHERE " } else { " AND " });
            Self::write_condition(w, qualifier, condition)?;
        }
        Ok(())
    }

    fn write_condition(
        w: &mut SqlWriter,
        qualifier: Option<&str>,
        condition: &Condition,
    ) -> AppResult<()> {
        let column = condition.column.as_str();
        validate_column(column)?;
        match &condition.op {
            FilterOp::Equals(Value::Null) | FilterOp::IsNull => {
                w.push_column(qualifier, column);
                w.push(" IS NULL");
            }
            FilterOp::NotEquals(Value::Null) | FilterOp::IsNotNull => {
                w.push_column(qualifier, column);
                w.push(" IS NOT NULL");
            }
            FilterOp::Equals(value) => Self::write_comparison(w, qualifier, column, "=", value)?,
            FilterOp::NotEquals(value) => Self::write_comparison(w, qualifier, column, "!=", value)?,
            FilterOp::In(values) if values.is_empty() => w.push("1 = 0"),
            FilterOp::In(values) => {
                w.push_column(qualifier, column);
                w.push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        w.push(", ");
                    }
                    w.push_value(value);
                }
                w.push(")");
            }
            FilterOp::GreaterThan(value) => Self::write_comparison(w, qualifier, column, ">", value)?,
            FilterOp::GreaterOrEqual(value) => {
                Self::write_comparison(w, qualifier, column, ">=", value)?;
            }
            FilterOp::LessThan(value) => Self::write_comparison(w, qualifier, column, "<", value)?,
            FilterOp::LessOrEqual(value) => {
                Self::write_comparison(w, qualifier, column, "<=", value)?;
            }
            FilterOp::Like(pattern) => {
                w.push_column(qualifier, column);
                w.push(" LIKE ");
                w.push_value(&Value::Text(pattern.clone()));
            }
        }
        Ok(())
    }

    fn write_comparison(
        w: &mut SqlWriter,
        qualifier: Option<&str>,
        column: &str,
        operator: &str,
        value: &Value,
    ) -> AppResult<()> {
        if value.is_null() {
            return Err(AppError::invalid_query(format!(
                "cannot compare '{column}' {operator} NULL; use a null check"
            )));
        }
        w.push_column(qualifier, column);
        w.push(" ");
        w.push(operator);
        w.push(" ");
        w.push_value(value);
        Ok(())
    }

    fn write_aggregate(w: &mut SqlWriter, alias: &str, aggregate: &AggregateExpr) -> AppResult<()> {
        w.push(aggregate.func.as_sql());
        w.push("(");
        match &aggregate.column {
            Some(column) => {
                validate_column(column)?;
                w.push_column(Some(alias), column);
            }
            None => w.push("*"),
        }
        w.push(")");
        Ok(())
    }

    fn write_grouping(w: &mut SqlWriter, alias: &str, options: &QueryOption) -> AppResult<()> {
        for (i, column) in options.group.iter().enumerate() {
            validate_column(column)?;
            w.push(if i == 0 { " GROUP BY " } else { ", " });
            w.push_column(Some(alias), column);
        }
        for (i, having) in options.having.iter().enumerate() {
            if having.value.is_null() {
                return Err(AppError::invalid_query(
                    "HAVING cannot compare an aggregate against NULL",
                ));
            }
            w.push(if i == 0 { " HAVING " } else { " AND " });
            Self::write_aggregate(w, alias, &having.aggregate)?;
            w.push(" ");
            w.push(having.op.as_sql());
            w.push(" ");
            w.push_value(&having.value);
        }
        Ok(())
    }

    fn write_order(
        w: &mut SqlWriter,
        alias: &str,
        relations: &[&Relation],
        options: &QueryOption,
    ) -> AppResult<()> {
        if options.sort.is_empty() {
            return Ok(());
        }
        let projected = Self::projected_names(relations, options);
        for (i, (column, order)) in options.sort.iter().enumerate() {
            w.push(if i == 0 { " ORDER BY " } else { ", " });
            if projected.contains(column) {
                validate_output_name(column)?;
                w.push_ident(column);
            } else if column.contains(COLUMN_SEPARATOR) {
                return Err(AppError::invalid_query(format!(
                    "sort key '{column}' names no projected column"
                )));
            } else {
                validate_column(column)?;
                w.push_column(Some(alias), column);
            }
            w.push(" ");
            w.push(order.as_sql());
        }
        Ok(())
    }

    fn write_insert_columns(w: &mut SqlWriter, columns: &[&str]) -> AppResult<()> {
        w.push(" (");
        for (i, column) in columns.iter().enumerate() {
            validate_column(column)?;
            if column.contains('.') {
                return Err(AppError::invalid_query(format!(
                    "insert column '{column}' must be unqualified"
                )));
            }
            if i > 0 {
                w.push(", ");
            }
            w.push_ident(column);
        }
        w.push(")");
        Ok(())
    }

    fn write_row(w: &mut SqlWriter, columns: &[&str], record: &Record) -> AppResult<()> {
        w.push("(");
        for (i, column) in columns.iter().enumerate() {
            let value = record.get(column).ok_or_else(|| {
                AppError::invalid_query(format!("batch insert record is missing column '{column}'"))
            })?;
            if i > 0 {
                w.push(", ");
            }
            w.push_value(value);
        }
        w.push(")");
        Ok(())
    }
}

fn split_schema(target: &str) -> (Option<&str>, &str) {
    match target.split_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use rizon_core::models::{
        AggregateFn, CompareOp, JoinKind, JoinOption, SortOrder,
    };

    fn pg() -> StatementBuilder {
        StatementBuilder::new(Dialect::Postgres)
    }

    fn sqlite() -> StatementBuilder {
        StatementBuilder::new(Dialect::Sqlite)
    }

    #[test]
    fn test_no_filters_selects_every_row() {
        let statement = pg().select("users", "u", &QueryOption::new()).unwrap();
        assert_eq!(statement.sql, r#"SELECT "u".* FROM "users" AS "u""#);
        assert!(statement.params.is_empty());
    }

    #[test]
    fn test_equality_is_parameterized() {
        let options = QueryOption::new().filter(Filter::new().equals("status", "active"));
        let statement = pg().select("users", "u", &options).unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT "u".* FROM "users" AS "u" WHERE "u"."status" = $1"#
        );
        assert_eq!(statement.params, vec![Value::from("active")]);
    }

    #[test]
    fn test_hostile_values_never_reach_sql_text() {
        let hostile = "x'; DROP TABLE users; --";
        let options = QueryOption::new().filter(Filter::new().equals("name", hostile));
        let statement = sqlite().select("users", "u", &options).unwrap();
        assert!(!statement.sql.contains("DROP"));
        assert_eq!(statement.params, vec![Value::from(hostile)]);
    }

    #[test]
    fn test_operator_variants() {
        let filter = Filter::new()
            .is_in("id", [1, 2, 3])
            .not_equals("role", "admin")
            .is_null("deleted_at")
            .is_not_null("email")
            .greater_or_equal("age", 18)
            .like("name", "A%");
        let options = QueryOption::new().filter(filter);
        let statement = pg().select("users", "u", &options).unwrap();
        assert_eq!(
            statement.sql,
            concat!(
                r#"SELECT "u".* FROM "users" AS "u" WHERE "u"."id" IN ($1, $2, $3)"#,
                r#" AND "u"."role" != $4 AND "u"."deleted_at" IS NULL"#,
                r#" AND "u"."email" IS NOT NULL AND "u"."age" >= $5 AND "u"."name" LIKE $6"#
            )
        );
        assert_eq!(statement.params.len(), 6);
        assert_eq!(statement.params[3], Value::from("admin"));
    }

    #[test]
    fn test_empty_in_list_matches_nothing() {
        let options = QueryOption::new().filter(Filter::new().is_in("id", Vec::<i64>::new()));
        let statement = pg().select("users", "u", &options).unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT "u".* FROM "users" AS "u" WHERE 1 = 0"#
        );
        assert!(statement.params.is_empty());
    }

    #[test]
    fn test_null_equality_becomes_null_check() {
        let filter = Filter::new()
            .equals("parent_id", Value::Null)
            .not_equals("archived_at", Value::Null);
        let statement = pg()
            .select("nodes", "n", &QueryOption::new().filter(filter))
            .unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT "n".* FROM "nodes" AS "n" WHERE "n"."parent_id" IS NULL AND "n"."archived_at" IS NOT NULL"#
        );
    }

    #[test]
    fn test_ordered_comparison_against_null_is_rejected() {
        let options = QueryOption::new().filter(Filter::new().greater_than("age", Value::Null));
        let error = pg().select("users", "u", &options).unwrap_err();
        assert_eq!(error.kind(), ErrorCode::InvalidQuery);
    }

    #[test]
    fn test_sort_and_pagination_order() {
        let options = QueryOption::new()
            .sort("created_at", SortOrder::Desc)
            .sort("id", SortOrder::Asc)
            .limit(2)
            .skip(1);
        let statement = pg().select("users", "u", &options).unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT "u".* FROM "users" AS "u" ORDER BY "u"."created_at" DESC, "u"."id" ASC LIMIT $1 OFFSET $2"#
        );
        assert_eq!(statement.params, vec![Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_sqlite_offset_without_limit() {
        let options = QueryOption::new().skip(3);
        let statement = sqlite().select("users", "u", &options).unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT "u".* FROM "users" AS "u" LIMIT -1 OFFSET ?"#
        );
        let statement = pg().select("users", "u", &options).unwrap();
        assert_eq!(statement.sql, r#"SELECT "u".* FROM "users" AS "u" OFFSET $1"#);
    }

    #[test]
    fn test_select_one_forces_single_row() {
        let options = QueryOption::new().limit(50).skip(4);
        let statement = pg().select_one("users", "u", &options).unwrap();
        assert!(statement.sql.ends_with("LIMIT $1 OFFSET $2"));
        assert_eq!(statement.params, vec![Value::Int(1), Value::Int(4)]);
    }

    #[test]
    fn test_selected_columns_follow_base_projection() {
        let options = QueryOption::new()
            .join(JoinOption::new(JoinKind::Inner, "orders", "o").on("id", "user_id"))
            .select("o.status");
        let statement = pg().select("users", "u", &options).unwrap();
        assert_eq!(
            statement.sql,
            concat!(
                r#"SELECT "u".*, "o"."status" FROM "users" AS "u""#,
                r#" INNER JOIN "orders" AS "o" ON "u"."id" = "o"."user_id""#
            )
        );
    }

    #[test]
    fn test_select_only_projection_and_distinct() {
        let options = QueryOption::new()
            .select("id")
            .select("email")
            .select_only(true)
            .distinct(true);
        let statement = pg().select("users", "u", &options).unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT DISTINCT "u"."id", "u"."email" FROM "users" AS "u""#
        );

        let error = pg()
            .select("users", "u", &QueryOption::new().select_only(true))
            .unwrap_err();
        assert_eq!(error.kind(), ErrorCode::InvalidQuery);
    }

    #[test]
    fn test_grouped_select_skips_repeated_group_columns() {
        let options = QueryOption::new()
            .group_by("status")
            .select("status")
            .aggregate(AggregateExpr::count_all(), "n");
        let statement = sqlite().select("orders", "o", &options).unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT "o"."status", COUNT(*) AS "n" FROM "orders" AS "o" GROUP BY "o"."status""#
        );
    }

    #[test]
    fn test_sort_by_projected_output_names() {
        let builder = pg().with_relations(RelationRegistry::new().with(
            "posts",
            Relation::new("author", "users", "author_id", "id").column("name"),
        ));
        let options = QueryOption::new()
            .relation("author")
            .join(
                JoinOption::new(JoinKind::Left, "comments", "c")
                    .on("id", "post_id")
                    .select("c.body"),
            )
            .sort("author__name", SortOrder::Asc)
            .sort("c__body", SortOrder::Desc);
        let statement = builder.select("posts", "p", &options).unwrap();
        assert!(statement
            .sql
            .ends_with(r#"ORDER BY "author__name" ASC, "c__body" DESC"#));

        let options = QueryOption::new().sort("c__body", SortOrder::Asc);
        let error = pg().select("posts", "p", &options).unwrap_err();
        assert_eq!(error.kind(), ErrorCode::InvalidQuery);
    }

    #[test]
    fn test_relations_then_joins_in_supplied_order() {
        let builder = pg().with_relations(RelationRegistry::new().with(
            "posts",
            Relation::new("author", "users", "author_id", "id").column("name"),
        ));
        let options = QueryOption::new()
            .relation("author")
            .join(
                JoinOption::new(JoinKind::Left, "comments", "c")
                    .on("id", "post_id")
                    .select("body"),
            )
            .join(JoinOption::new(JoinKind::Inner, "tags", "t").on("tag_id", "id"))
            .filter(Filter::new().equals("c.flagged", false));
        let statement = builder.select("posts", "p", &options).unwrap();
        assert_eq!(
            statement.sql,
            concat!(
                r#"SELECT "p".*, "author"."name" AS "author__name", "c"."body" AS "c__body""#,
                r#" FROM "posts" AS "p""#,
                r#" LEFT JOIN "users" AS "author" ON "p"."author_id" = "author"."id""#,
                r#" LEFT JOIN "comments" AS "c" ON "p"."id" = "c"."post_id""#,
                r#" INNER JOIN "tags" AS "t" ON "p"."tag_id" = "t"."id""#,
                r#" WHERE "c"."flagged" = $1"#
            )
        );
    }

    #[test]
    fn test_unknown_relation_is_invalid() {
        let options = QueryOption::new().relation("author");
        let error = pg().select("posts", "p", &options).unwrap_err();
        assert_eq!(error.kind(), ErrorCode::InvalidQuery);
        assert!(error.message.contains("author"));
    }

    #[test]
    fn test_join_without_condition_is_invalid() {
        let options = QueryOption::new().join(JoinOption::new(JoinKind::Inner, "orders", "o"));
        assert!(pg().select("users", "u", &options).is_err());
    }

    #[test]
    fn test_group_having_and_aggregate_projection() {
        let options = QueryOption::new()
            .group_by("status")
            .aggregate(AggregateExpr::count_all(), "total")
            .having(AggregateExpr::of(AggregateFn::Sum, "amount"), CompareOp::Gt, 100)
            .sort("total", SortOrder::Desc);
        let statement = pg().select("orders", "o", &options).unwrap();
        assert_eq!(
            statement.sql,
            concat!(
                r#"SELECT "o"."status", COUNT(*) AS "total" FROM "orders" AS "o""#,
                r#" GROUP BY "o"."status" HAVING SUM("o"."amount") > $1 ORDER BY "total" DESC"#
            )
        );
        assert_eq!(statement.params, vec![Value::Int(100)]);
    }

    #[test]
    fn test_count_ignores_projection_and_pagination() {
        let options = QueryOption::new()
            .filter(Filter::new().equals("status", "active"))
            .select("email")
            .sort("id", SortOrder::Asc)
            .limit(1);
        let statement = pg().count("users", "u", &options).unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT COUNT(*) AS "count" FROM "users" AS "u" WHERE "u"."status" = $1"#
        );
        assert_eq!(statement.params, vec![Value::from("active")]);
    }

    #[test]
    fn test_count_distinct_wraps_subquery() {
        let options = QueryOption::new()
            .distinct(true)
            .join(JoinOption::new(JoinKind::Inner, "orders", "o").on("id", "user_id"))
            .limit(5);
        let statement = pg().count("users", "u", &options).unwrap();
        assert_eq!(
            statement.sql,
            concat!(
                r#"SELECT COUNT(*) AS "count" FROM (SELECT DISTINCT "u".* FROM "users" AS "u""#,
                r#" INNER JOIN "orders" AS "o" ON "u"."id" = "o"."user_id") AS "counted""#
            )
        );
    }

    #[test]
    fn test_count_distinct_keeps_join_projections() {
        let options = QueryOption::new().distinct(true).join(
            JoinOption::new(JoinKind::Inner, "orders", "o")
                .on("id", "user_id")
                .select("status"),
        );
        let statement = pg().count("users", "u", &options).unwrap();
        assert_eq!(
            statement.sql,
            concat!(
                r#"SELECT COUNT(*) AS "count" FROM (SELECT DISTINCT "u".*, "o"."status" AS "o__status""#,
                r#" FROM "users" AS "u" INNER JOIN "orders" AS "o" ON "u"."id" = "o"."user_id") AS "counted""#
            )
        );
    }

    #[test]
    fn test_count_of_ungrouped_aggregates_counts_one_row() {
        let options = QueryOption::new()
            .aggregate(AggregateExpr::of(AggregateFn::Max, "amount"), "largest");
        let statement = pg().count("orders", "o", &options).unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT COUNT(*) AS "count" FROM (SELECT MAX("o"."amount") AS "largest" FROM "orders" AS "o") AS "counted""#
        );
    }

    #[test]
    fn test_count_distinct_over_selected_columns() {
        let options = QueryOption::new().select("status").select_only(true).distinct(true);
        let statement = sqlite().count("orders", "o", &options).unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT COUNT(*) AS "count" FROM (SELECT DISTINCT "o"."status" FROM "orders" AS "o") AS "counted""#
        );
    }

    #[test]
    fn test_empty_target_or_alias_is_rejected_before_execution() {
        assert_eq!(
            pg().select("", "u", &QueryOption::new()).unwrap_err().kind(),
            ErrorCode::InvalidQuery
        );
        assert_eq!(
            pg().select("users", "", &QueryOption::new()).unwrap_err().kind(),
            ErrorCode::InvalidQuery
        );
    }

    #[test]
    fn test_reserved_suffix_column_is_rejected() {
        let options = QueryOption::new().filter(Filter::new().equals("status__ne", "x"));
        let error = pg().select("users", "u", &options).unwrap_err();
        assert!(error.message.contains("reserved"));
    }

    #[test]
    fn test_insert_emits_null_literal() {
        let record = Record::new().with("email", "a@example.com").with("nickname", Value::Null);
        let statement = pg().insert("users", &record).unwrap();
        assert_eq!(
            statement.sql,
            r#"INSERT INTO "users" ("email", "nickname") VALUES ($1, NULL)"#
        );
        assert_eq!(statement.params, vec![Value::from("a@example.com")]);
    }

    #[test]
    fn test_insert_many_aligns_columns_to_first_record() {
        let records = vec![
            Record::new().with("a", 1).with("b", 2),
            Record::new().with("b", 4).with("a", 3),
        ];
        let statement = sqlite().insert_many("pairs", &records).unwrap().unwrap();
        assert_eq!(
            statement.sql,
            r#"INSERT INTO "pairs" ("a", "b") VALUES (?, ?), (?, ?)"#
        );
        assert_eq!(
            statement.params,
            vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]
        );
        assert!(sqlite().insert_many("pairs", &[]).unwrap().is_none());
    }

    #[test]
    fn test_insert_many_rejects_mismatched_columns() {
        let records = vec![
            Record::new().with("a", 1).with("b", 2),
            Record::new().with("a", 3).with("c", 4),
        ];
        let error = sqlite().insert_many("pairs", &records).unwrap_err();
        assert_eq!(error.kind(), ErrorCode::InvalidQuery);
    }

    #[test]
    fn test_update_sets_only_present_columns() {
        let filter = Filter::new().equals("id", 7);
        let changes = Record::new().with("name", "Grace");
        let statement = pg().update("users", &filter, &changes).unwrap();
        assert_eq!(
            statement.sql,
            r#"UPDATE "users" SET "name" = $1 WHERE "id" = $2"#
        );
        assert_eq!(statement.params, vec![Value::from("Grace"), Value::Int(7)]);
    }

    #[test]
    fn test_update_requires_fields() {
        let error = pg()
            .update("users", &Filter::new(), &Record::new())
            .unwrap_err();
        assert_eq!(error.kind(), ErrorCode::InvalidQuery);
    }

    #[test]
    fn test_delete_with_filter() {
        let statement = sqlite()
            .delete("users", &Filter::new().is_in("id", [1, 2]))
            .unwrap();
        assert_eq!(statement.sql, r#"DELETE FROM "users" WHERE "id" IN (?, ?)"#);
    }

    #[test]
    fn test_upsert_updates_non_key_columns() {
        let record = Record::new()
            .with("email", "a@example.com")
            .with("name", "Ada")
            .with("age", 36);
        let statement = pg().upsert("users", "email", &record).unwrap();
        assert_eq!(
            statement.sql,
            concat!(
                r#"INSERT INTO "users" ("email", "name", "age") VALUES ($1, $2, $3)"#,
                r#" ON CONFLICT ("email") DO UPDATE SET "name" = EXCLUDED."name", "age" = EXCLUDED."age""#
            )
        );
    }

    #[test]
    fn test_upsert_key_only_does_nothing() {
        let record = Record::new().with("email", "a@example.com");
        let statement = pg().upsert("users", "email", &record).unwrap();
        assert!(statement.sql.ends_with(r#"ON CONFLICT ("email") DO NOTHING"#));
    }

    #[test]
    fn test_upsert_requires_key_in_record() {
        let record = Record::new().with("name", "Ada");
        let error = pg().upsert("users", "email", &record).unwrap_err();
        assert_eq!(error.kind(), ErrorCode::InvalidQuery);
    }

    #[test]
    fn test_distinct_field() {
        let statement = pg()
            .distinct("users", "country", &Filter::new().equals("active", true))
            .unwrap();
        assert_eq!(
            statement.sql,
            r#"SELECT DISTINCT "country" FROM "users" WHERE "active" = $1 ORDER BY "country""#
        );
    }

    #[test]
    fn test_index_statements() {
        let index = Index::on("email").key("created_at", SortOrder::Desc).unique();
        let statement = pg().create_index("users", &index).unwrap();
        assert_eq!(
            statement.sql,
            r#"CREATE UNIQUE INDEX IF NOT EXISTS "idx_users_email_created_at_uniq" ON "users" ("email" ASC, "created_at" DESC)"#
        );
        let statement = pg().drop_index("users", &index).unwrap();
        assert_eq!(
            statement.sql,
            r#"DROP INDEX IF EXISTS "idx_users_email_created_at_uniq""#
        );
    }

    #[test]
    fn test_sparse_index_is_partial() {
        let index = Index::on("external_id").sparse().named("users_external_id");
        let statement = sqlite().create_index("main.users", &index).unwrap();
        assert_eq!(
            statement.sql,
            r#"CREATE INDEX IF NOT EXISTS "main"."users_external_id" ON "users" ("external_id" ASC) WHERE "external_id" IS NOT NULL"#
        );
    }

    #[test]
    fn test_index_without_keys_is_invalid() {
        let index = Index {
            keys: Vec::new(),
            unique: false,
            sparse: false,
            name: Some("empty".to_owned()),
        };
        assert!(pg().create_index("users", &index).is_err());
    }
}
