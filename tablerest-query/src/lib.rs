//! tablerest query translation engine
//!
//! Shared grammar, query-string parser and filter applier:
//! - `column.operator=value` filters (eq, neq, gt, gte, lt, lte, like, ilike, is, in, not.in)
//! - `and=(...)` / `or=(...)` logical groups
//! - `join`, `leftJoin`, `rightJoin`
//! - `select`, `with`, `order`, `limit`, `offset`, `count`
//!
//! The parser produces a [`QueryDescription`]; [`applier::apply`] replays it
//! onto any [`QueryBuilder`]. [`SqlBuilder`] renders parameterized SQL.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod applier;
pub mod description;
pub mod grammar;
pub mod parser;
pub mod sql;

pub use applier::{apply, apply_count, Predicate, QueryBuilder};
pub use description::{FilterClause, JoinClause, LogicalGroup, OrderClause, QueryDescription};
pub use grammar::{Boolean, Direction, GrammarOptions, JoinKind, Operator, ParseMode};
pub use parser::QueryParser;
pub use sql::SqlBuilder;
