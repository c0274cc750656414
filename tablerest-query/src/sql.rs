//! Parameterized SQL rendering
//!
//! [`SqlBuilder`] is a [`QueryBuilder`] that renders PostgreSQL text with
//! `$n` placeholders. Identifiers are double-quoted and every value is pushed
//! onto the parameter list, never spliced into the statement.

use crate::applier::{Predicate, QueryBuilder};
use crate::grammar::{Boolean, Direction, JoinKind};

/// Quote an identifier, `*` passes through
pub fn quote_ident(name: &str) -> String {
    if name == "*" {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Builds `SELECT` and `SELECT COUNT(*)` statements for one table
#[derive(Debug, Clone)]
pub struct SqlBuilder {
    table: String,
    columns: Vec<String>,
    relations: Vec<String>,
    joins: Vec<String>,
    conditions: Vec<(Boolean, String)>,
    order: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    params: Vec<String>,
}

impl SqlBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            relations: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            params: Vec::new(),
        }
    }

    /// Bound parameters, `$1` first
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Relations requested for eager loading; the executor resolves these
    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    /// Render the row query
    pub fn to_sql(&self) -> String {
        let columns = if self.columns.is_empty() || self.columns.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", columns, quote_ident(&self.table));
        self.push_from_where(&mut sql);

        if !self.order.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.order.join(", ")));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        sql
    }

    /// Render the count query from the same joins and conditions
    pub fn to_count_sql(&self) -> String {
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table));
        self.push_from_where(&mut sql);
        sql
    }

    fn push_from_where(&self, sql: &mut String) {
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }

        for (index, (boolean, condition)) in self.conditions.iter().enumerate() {
            let connector = match (index, boolean) {
                (0, _) => " WHERE ",
                (_, Boolean::And) => " AND ",
                (_, Boolean::Or) => " OR ",
            };
            sql.push_str(connector);
            sql.push_str(condition);
        }
    }

    fn bind(&mut self, value: String) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    fn bind_list(&mut self, values: Vec<String>) -> String {
        values
            .into_iter()
            .map(|v| self.bind(v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl QueryBuilder for SqlBuilder {
    fn join(&mut self, kind: JoinKind, table: &str, left_key: &str, right_key: &str) {
        self.joins.push(format!(
            "{} {} ON {}.{} = {}.{}",
            kind.sql(),
            quote_ident(table),
            quote_ident(&self.table),
            quote_ident(left_key),
            quote_ident(table),
            quote_ident(right_key),
        ));
    }

    fn where_clause(&mut self, boolean: Boolean, column: &str, predicate: Predicate) {
        let column = quote_ident(column);
        let condition = match predicate {
            Predicate::Compare { operator, value } => {
                let placeholder = self.bind(value);
                format!("{column} {} {placeholder}", operator.sql())
            }
            Predicate::IsNull => format!("{column} IS NULL"),
            Predicate::IsNotNull => format!("{column} IS NOT NULL"),
            // An empty membership list matches nothing; its negation matches everything.
            Predicate::In(values) if values.is_empty() => "1 = 0".to_string(),
            Predicate::NotIn(values) if values.is_empty() => "1 = 1".to_string(),
            Predicate::In(values) => format!("{column} IN ({})", self.bind_list(values)),
            Predicate::NotIn(values) => format!("{column} NOT IN ({})", self.bind_list(values)),
        };
        self.conditions.push((boolean, condition));
    }

    fn select(&mut self, columns: &[String]) {
        self.columns = columns.to_vec();
    }

    fn with(&mut self, relations: &[String]) {
        self.relations.extend_from_slice(relations);
    }

    fn order_by(&mut self, column: &str, direction: Direction) {
        self.order
            .push(format!("{} {}", quote_ident(column), direction.sql()));
    }

    fn limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    fn offset(&mut self, offset: u64) {
        self.offset = Some(offset);
    }
}
