//! Filter applier
//!
//! Walks a [`QueryDescription`] and drives a [`QueryBuilder`] in a fixed
//! order: joins, plain filters, the AND-group, the OR-group, select, eager
//! loads, order clauses, limit, offset. Values always travel as predicate
//! payloads so builders can bind them as parameters.

use tracing::debug;

use crate::description::{FilterClause, QueryDescription};
use crate::grammar::{Boolean, Direction, JoinKind, Operator};

/// A predicate on a single column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `column <op> value` for the comparison and pattern operators
    Compare { operator: Operator, value: String },
    IsNull,
    IsNotNull,
    In(Vec<String>),
    NotIn(Vec<String>),
}

impl Predicate {
    /// Map a clause onto a predicate.
    ///
    /// Returns `None` when the clause cannot contribute a condition, e.g. a
    /// missing value or an `is` value other than `null`/`not.null`.
    pub fn from_clause(clause: &FilterClause) -> Option<Self> {
        let value = clause.value.as_deref()?;
        let predicate = match clause.operator {
            Operator::Is => {
                let value = value.trim();
                if value.eq_ignore_ascii_case("null") {
                    Self::IsNull
                } else if value.eq_ignore_ascii_case("not.null") {
                    Self::IsNotNull
                } else {
                    return None;
                }
            }
            Operator::In => Self::In(parse_list(value)),
            Operator::NotIn => Self::NotIn(parse_list(value)),
            operator => Self::Compare {
                operator,
                value: value.to_string(),
            },
        };
        Some(predicate)
    }
}

/// Split a membership list: optional surrounding parentheses, comma
/// separated, each item trimmed, empty items dropped.
pub fn parse_list(value: &str) -> Vec<String> {
    let value = value.trim();
    let value = value.strip_prefix('(').unwrap_or(value);
    let value = value.strip_suffix(')').unwrap_or(value);

    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Query-building capability provided by the store
pub trait QueryBuilder {
    fn join(&mut self, kind: JoinKind, table: &str, left_key: &str, right_key: &str);

    /// Attach a predicate. The first predicate ignores `boolean`.
    fn where_clause(&mut self, boolean: Boolean, column: &str, predicate: Predicate);

    fn select(&mut self, columns: &[String]);

    fn with(&mut self, relations: &[String]);

    fn order_by(&mut self, column: &str, direction: Direction);

    fn limit(&mut self, limit: u64);

    fn offset(&mut self, offset: u64);
}

/// Apply the whole description to `builder`
pub fn apply<B: QueryBuilder + ?Sized>(description: &QueryDescription, builder: &mut B) {
    apply_conditions(description, builder);

    builder.select(&description.select_columns);
    if !description.with_relations.is_empty() {
        builder.with(&description.with_relations);
    }

    for clause in &description.order {
        builder.order_by(&clause.column, clause.direction);
    }

    if let Some(limit) = description.limit {
        builder.limit(limit);
    }
    if let Some(offset) = description.offset {
        builder.offset(offset);
    }
}

/// Apply only joins and filters, for the companion count query
pub fn apply_count<B: QueryBuilder + ?Sized>(description: &QueryDescription, builder: &mut B) {
    apply_conditions(description, builder);
}

fn apply_conditions<B: QueryBuilder + ?Sized>(description: &QueryDescription, builder: &mut B) {
    for join in &description.joins {
        builder.join(join.kind, &join.table, &join.left_key, &join.right_key);
    }

    for clause in description
        .filters
        .iter()
        .chain(&description.and_group.clauses)
    {
        push_clause(builder, Boolean::And, clause);
    }

    // First OR clause is a plain predicate, the rest chain onto it.
    let mut boolean = Boolean::And;
    for clause in &description.or_group.clauses {
        if push_clause(builder, boolean, clause) {
            boolean = Boolean::Or;
        }
    }
}

fn push_clause<B: QueryBuilder + ?Sized>(
    builder: &mut B,
    boolean: Boolean,
    clause: &FilterClause,
) -> bool {
    match Predicate::from_clause(clause) {
        Some(predicate) => {
            builder.where_clause(boolean, &clause.column, predicate);
            true
        }
        None => {
            debug!(
                column = %clause.column,
                operator = %clause.operator,
                "dropping filter that maps to no predicate"
            );
            false
        }
    }
}
