// ABOUTME: Query option model describing filters, sorting, joins, grouping and pagination
// ABOUTME: Filter operators are tagged variants; the legacy suffix grammar is parsed into them
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Query option model
//!
//! Pure data. Any combination of fields is structurally legal; the adapters
//! decide whether it is semantically valid for their backend and reject it
//! with `InvalidQuery` before anything is sent over the wire.

use super::value::Value;
use crate::constants::filters;
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending
    #[default]
    Asc,
    /// Descending
    Desc,
}

impl SortOrder {
    /// SQL keyword
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Comparison applied to one column
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// `column = value` (`IS NULL` when the value is null)
    Equals(Value),
    /// `column IN (values...)`; an empty list matches nothing
    In(Vec<Value>),
    /// `column != value` (`IS NOT NULL` when the value is null)
    NotEquals(Value),
    /// `column IS NULL`
    IsNull,
    /// `column IS NOT NULL`
    IsNotNull,
    /// `column > value`
    GreaterThan(Value),
    /// `column >= value`
    GreaterOrEqual(Value),
    /// `column < value`
    LessThan(Value),
    /// `column <= value`
    LessOrEqual(Value),
    /// `column LIKE pattern`
    Like(String),
}

/// One filter condition
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Column, optionally qualified with a join alias (`o.amount`)
    pub column: String,
    /// Operator and operand
    pub op: FilterOp,
}

impl Condition {
    /// Create a condition
    #[must_use]
    pub fn new(column: impl Into<String>, op: FilterOp) -> Self {
        Self {
            column: column.into(),
            op,
        }
    }
}

/// Conjunction of conditions; an empty filter matches every row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Empty filter
    #[must_use]
    pub const fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Add a condition
    #[must_use]
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// `column = value`
    #[must_use]
    pub fn equals(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::new(column, FilterOp::Equals(value.into())))
    }

    /// `column != value`
    #[must_use]
    pub fn not_equals(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::new(column, FilterOp::NotEquals(value.into())))
    }

    /// `column IN (values...)`
    #[must_use]
    pub fn is_in<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.and(Condition::new(column, FilterOp::In(values)))
    }

    /// `column IS NULL`
    #[must_use]
    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.and(Condition::new(column, FilterOp::IsNull))
    }

    /// `column IS NOT NULL`
    #[must_use]
    pub fn is_not_null(self, column: impl Into<String>) -> Self {
        self.and(Condition::new(column, FilterOp::IsNotNull))
    }

    /// `column > value`
    #[must_use]
    pub fn greater_than(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::new(column, FilterOp::GreaterThan(value.into())))
    }

    /// `column >= value`
    #[must_use]
    pub fn greater_or_equal(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::new(column, FilterOp::GreaterOrEqual(value.into())))
    }

    /// `column < value`
    #[must_use]
    pub fn less_than(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::new(column, FilterOp::LessThan(value.into())))
    }

    /// `column <= value`
    #[must_use]
    pub fn less_or_equal(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::new(column, FilterOp::LessOrEqual(value.into())))
    }

    /// `column LIKE pattern`
    #[must_use]
    pub fn like(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.and(Condition::new(column, FilterOp::Like(pattern.into())))
    }

    /// Conditions in the order they were added
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Whether the filter has no conditions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Parse one string-keyed filter entry (`status`, `id__in`, `deleted_at__is_null`)
    ///
    /// Exactly one reserved suffix is recognized and stripped; keys without a
    /// suffix mean equality. `__in` expects a JSON array operand and
    /// `__like` a text operand. The null checks ignore the operand.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` if the column part is empty or the operand has
    /// the wrong shape for the operator
    pub fn parse_key(key: &str, value: Value) -> AppResult<Condition> {
        let (column, suffix) = split_suffix(key);
        if column.is_empty() {
            return Err(AppError::invalid_query(format!(
                "filter key '{key}' has no column name"
            )));
        }
        let op = match suffix {
            Some(filters::SUFFIX_IN) => FilterOp::In(into_list(key, value)?),
            Some(filters::SUFFIX_NOT_EQUALS) => FilterOp::NotEquals(value),
            Some(filters::SUFFIX_IS_NULL) => FilterOp::IsNull,
            Some(filters::SUFFIX_IS_NOT_NULL) => FilterOp::IsNotNull,
            Some(filters::SUFFIX_GREATER_THAN) => FilterOp::GreaterThan(value),
            Some(filters::SUFFIX_GREATER_OR_EQUAL) => FilterOp::GreaterOrEqual(value),
            Some(filters::SUFFIX_LESS_THAN) => FilterOp::LessThan(value),
            Some(filters::SUFFIX_LESS_OR_EQUAL) => FilterOp::LessOrEqual(value),
            Some(filters::SUFFIX_LIKE) => match value {
                Value::Text(pattern) => FilterOp::Like(pattern),
                other => {
                    return Err(AppError::invalid_query(format!(
                        "filter key '{key}' expects a text pattern, got {}",
                        other.type_name()
                    )))
                }
            },
            _ => FilterOp::Equals(value),
        };
        Ok(Condition::new(column, op))
    }

    /// Parse string-keyed entries in the order given
    ///
    /// # Errors
    ///
    /// Returns the first `InvalidQuery` raised by [`Filter::parse_key`]
    pub fn from_pairs<K: AsRef<str>>(pairs: impl IntoIterator<Item = (K, Value)>) -> AppResult<Self> {
        pairs
            .into_iter()
            .try_fold(Self::new(), |filter, (key, value)| {
                Ok(filter.and(Self::parse_key(key.as_ref(), value)?))
            })
    }
}

impl FromIterator<Condition> for Filter {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        Self {
            conditions: iter.into_iter().collect(),
        }
    }
}

fn split_suffix(key: &str) -> (&str, Option<&'static str>) {
    filters::RESERVED_SUFFIXES
        .iter()
        .find_map(|suffix| key.strip_suffix(suffix).map(|column| (column, Some(*suffix))))
        .unwrap_or((key, None))
}

fn into_list(key: &str, value: Value) -> AppResult<Vec<Value>> {
    match value {
        Value::Json(serde_json::Value::Array(items)) => Ok(items.into_iter().map(Value::from).collect()),
        other => Err(AppError::invalid_query(format!(
            "filter key '{key}' expects an ordered list, got {}",
            other.type_name()
        ))),
    }
}

/// Join flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// `INNER JOIN`
    #[default]
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// `FULL JOIN`
    Full,
}

impl JoinKind {
    /// SQL keyword
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL JOIN",
        }
    }
}

/// Column equality used in a join condition (`u.id = o.user_id`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOn {
    /// Qualified column on one side
    pub left: String,
    /// Qualified column on the other side
    pub right: String,
}

/// An explicit join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOption {
    /// Join flavor
    pub kind: JoinKind,
    /// Joined table
    pub table: String,
    /// Alias of the joined table
    pub alias: String,
    /// Equalities ANDed into the `ON` clause
    pub on: Vec<JoinOn>,
    /// Columns of the joined table to project (as `alias__column`)
    pub select: Vec<String>,
}

impl JoinOption {
    /// Start a join of `table AS alias`
    #[must_use]
    pub fn new(kind: JoinKind, table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            alias: alias.into(),
            on: Vec::new(),
            select: Vec::new(),
        }
    }

    /// Add an `ON left = right` equality
    #[must_use]
    pub fn on(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.on.push(JoinOn {
            left: left.into(),
            right: right.into(),
        });
        self
    }

    /// Project a column of the joined table
    #[must_use]
    pub fn select(mut self, column: impl Into<String>) -> Self {
        self.select.push(column.into());
        self
    }
}

/// Aggregate function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    /// `COUNT`
    Count,
    /// `SUM`
    Sum,
    /// `AVG`
    Avg,
    /// `MIN`
    Min,
    /// `MAX`
    Max,
}

impl AggregateFn {
    /// SQL function name
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// Aggregate over a column, or over all rows when `column` is `None` (`COUNT(*)`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateExpr {
    /// Function
    pub func: AggregateFn,
    /// Column argument
    pub column: Option<String>,
}

impl AggregateExpr {
    /// `COUNT(*)`
    #[must_use]
    pub const fn count_all() -> Self {
        Self {
            func: AggregateFn::Count,
            column: None,
        }
    }

    /// `func(column)`
    #[must_use]
    pub fn of(func: AggregateFn, column: impl Into<String>) -> Self {
        Self {
            func,
            column: Some(column.into()),
        }
    }
}

/// Comparison used by `HAVING`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

impl CompareOp {
    /// SQL operator
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// Post-aggregation condition (`HAVING SUM(o.amount) > 100`)
#[derive(Debug, Clone, PartialEq)]
pub struct Having {
    /// Aggregate on the left-hand side
    pub aggregate: AggregateExpr,
    /// Comparison
    pub op: CompareOp,
    /// Bound right-hand side
    pub value: Value,
}

/// Everything that shapes one read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOption {
    /// Conditions ANDed into `WHERE`
    pub filter: Filter,
    /// `ORDER BY` entries in priority order
    pub sort: Vec<(String, SortOrder)>,
    /// Maximum rows; zero means unlimited
    pub limit: u64,
    /// Rows to skip; zero means none
    pub skip: u64,
    /// Extra projected columns, emitted after every column of the primary entity
    pub select: Vec<String>,
    /// Project only `select` (plus aggregates, relations and join columns)
    /// instead of every column of the primary entity
    pub select_only: bool,
    /// Explicit joins in emission order
    pub join: Vec<JoinOption>,
    /// `GROUP BY` columns
    pub group: Vec<String>,
    /// `HAVING` conditions, ANDed
    pub having: Vec<Having>,
    /// Aggregate projections with their output names
    pub aggregates: Vec<(AggregateExpr, String)>,
    /// `SELECT DISTINCT`
    pub distinct: bool,
    /// Named relations to expand
    pub relations: Vec<String>,
}

impl QueryOption {
    /// Options matching every row
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the filter
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Append a sort key
    #[must_use]
    pub fn sort(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((column.into(), order));
        self
    }

    /// Set the row limit
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Set the row offset
    #[must_use]
    pub const fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Project an extra column after the primary entity's columns
    #[must_use]
    pub fn select(mut self, column: impl Into<String>) -> Self {
        self.select.push(column.into());
        self
    }

    /// Drop the primary entity's columns from the projection, keeping only
    /// what `select` and the other projections name
    #[must_use]
    pub const fn select_only(mut self, select_only: bool) -> Self {
        self.select_only = select_only;
        self
    }

    /// Append an explicit join
    #[must_use]
    pub fn join(mut self, join: JoinOption) -> Self {
        self.join.push(join);
        self
    }

    /// Append a grouping column
    #[must_use]
    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group.push(column.into());
        self
    }

    /// Append a `HAVING` condition
    #[must_use]
    pub fn having(mut self, aggregate: AggregateExpr, op: CompareOp, value: impl Into<Value>) -> Self {
        self.having.push(Having {
            aggregate,
            op,
            value: value.into(),
        });
        self
    }

    /// Project an aggregate under `name`
    #[must_use]
    pub fn aggregate(mut self, aggregate: AggregateExpr, name: impl Into<String>) -> Self {
        self.aggregates.push((aggregate, name.into()));
        self
    }

    /// Toggle `SELECT DISTINCT`
    #[must_use]
    pub const fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Expand a named relation
    #[must_use]
    pub fn relation(mut self, name: impl Into<String>) -> Self {
        self.relations.push(name.into());
        self
    }
}
