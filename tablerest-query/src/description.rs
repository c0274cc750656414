//! Normalized query description produced by the parser

use crate::grammar::{Boolean, Direction, JoinKind, Operator};

/// One `column.operator=value` predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub column: String,
    pub operator: Operator,
    pub value: Option<String>,
}

impl FilterClause {
    pub fn new(column: impl Into<String>, operator: Operator, value: Option<String>) -> Self {
        Self {
            column: column.into(),
            operator,
            value,
        }
    }
}

/// Order clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClause {
    pub column: String,
    pub direction: Direction,
}

/// Join clause, `table:left_key=right_key` on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: String,
    pub left_key: String,
    pub right_key: String,
}

/// Clauses combined by a single boolean connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalGroup {
    pub combinator: Boolean,
    pub clauses: Vec<FilterClause>,
}

impl LogicalGroup {
    pub fn new(combinator: Boolean) -> Self {
        Self {
            combinator,
            clauses: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Everything a request asks of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescription {
    pub select_columns: Vec<String>,
    pub with_relations: Vec<String>,
    pub filters: Vec<FilterClause>,
    pub and_group: LogicalGroup,
    pub or_group: LogicalGroup,
    pub joins: Vec<JoinClause>,
    pub order: Vec<OrderClause>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub count_requested: bool,
}

impl Default for QueryDescription {
    fn default() -> Self {
        Self {
            select_columns: Vec::new(),
            with_relations: Vec::new(),
            filters: Vec::new(),
            and_group: LogicalGroup::new(Boolean::And),
            or_group: LogicalGroup::new(Boolean::Or),
            joins: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            count_requested: false,
        }
    }
}

impl QueryDescription {
    /// Whether the select list means "all columns"
    pub fn selects_all(&self) -> bool {
        self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*")
    }

    /// Every filter clause in application order
    pub fn all_filters(&self) -> impl Iterator<Item = &FilterClause> {
        self.filters
            .iter()
            .chain(&self.and_group.clauses)
            .chain(&self.or_group.clauses)
    }
}
