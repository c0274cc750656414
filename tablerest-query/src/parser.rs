//! Query string parsing
//!
//! Turns `select=...&age.gte=18&order=name.desc&...` into a
//! [`QueryDescription`]. Malformed fragments are dropped in lenient mode and
//! rejected in strict mode; the parser never touches the store.

use tracing::debug;

use tablerest_common::error::{Error, Result};

use crate::applier::Predicate;
use crate::description::{FilterClause, JoinClause, OrderClause, QueryDescription};
use crate::grammar::{self, Direction, GrammarOptions, JoinKind, Operator, ParseMode};

/// Query-string parser configured with a set of grammar capabilities
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParser {
    options: GrammarOptions,
}

impl QueryParser {
    pub fn new(options: GrammarOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> GrammarOptions {
        self.options
    }

    /// Parse a raw (percent-encoded) query string
    pub fn parse(&self, query_string: &str) -> Result<QueryDescription> {
        let pairs = url::form_urlencoded::parse(query_string.as_bytes()).into_owned();
        self.parse_pairs(pairs)
    }

    /// Parse already-decoded key/value pairs, keeping repeated keys in order
    pub fn parse_pairs<I, K, V>(&self, pairs: I) -> Result<QueryDescription>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut description = QueryDescription::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());

            match key {
                grammar::SELECT => description.select_columns.extend(split_list(value)),
                grammar::WITH => description.with_relations.extend(split_list(value)),
                grammar::ORDER => self.parse_order(value, &mut description.order)?,
                grammar::LIMIT => description.limit = Some(self.parse_integer(key, value)?),
                grammar::OFFSET => description.offset = Some(self.parse_integer(key, value)?),
                grammar::COUNT => description.count_requested = true,
                grammar::AND | grammar::OR => {
                    if !self.options.groups {
                        debug!(key, "logical groups disabled, ignoring");
                        continue;
                    }
                    let group = if key == grammar::AND {
                        &mut description.and_group
                    } else {
                        &mut description.or_group
                    };
                    self.parse_group(value, &mut group.clauses)?;
                }
                grammar::JOIN | grammar::LEFT_JOIN | grammar::RIGHT_JOIN => {
                    if !self.options.joins {
                        debug!(key, "joins disabled, ignoring");
                        continue;
                    }
                    if let Some(kind) = JoinKind::from_key(key) {
                        self.parse_joins(kind, value, &mut description.joins)?;
                    }
                }
                _ => {
                    if let Some(clause) = self.parse_filter(key, value)? {
                        description.filters.push(clause);
                    }
                }
            }
        }

        if description.select_columns.is_empty() {
            description.select_columns.push("*".to_string());
        }

        Ok(description)
    }

    /// Drop the fragment in lenient mode, fail in strict mode
    fn reject<T>(&self, error: Error) -> Result<Option<T>> {
        match self.options.mode {
            ParseMode::Strict => Err(error),
            ParseMode::Lenient => {
                debug!(%error, "dropping malformed query fragment");
                Ok(None)
            }
        }
    }

    fn parse_integer(&self, key: &str, value: &str) -> Result<u64> {
        match self.options.mode {
            ParseMode::Strict => value
                .trim()
                .parse()
                .map_err(|_| Error::InvalidQueryParam(format!("{key}={value}"))),
            ParseMode::Lenient => Ok(coerce_integer(value)),
        }
    }

    fn parse_order(&self, value: &str, order: &mut Vec<OrderClause>) -> Result<()> {
        for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (column, direction) = match token.split_once('.') {
                Some((column, direction)) => (column, Some(direction)),
                None => (token, None),
            };

            if !grammar::is_valid_identifier(column) {
                self.reject::<()>(Error::InvalidIdentifier(column.to_string()))?;
                continue;
            }

            let direction = match direction {
                None => Direction::Asc,
                Some(raw) => match Direction::parse(raw) {
                    Some(direction) => direction,
                    None if self.options.mode == ParseMode::Strict => {
                        return Err(Error::InvalidQueryParam(format!("order={token}")));
                    }
                    None => Direction::Asc,
                },
            };

            order.push(OrderClause {
                column: column.to_string(),
                direction,
            });
        }
        Ok(())
    }

    fn parse_filter(&self, key: &str, value: &str) -> Result<Option<FilterClause>> {
        let (column, operator) = match key.split_once('.') {
            Some((column, raw)) => match Operator::parse(raw) {
                Some(operator) => (column, operator),
                None => {
                    return self.reject(Error::InvalidFilter(format!(
                        "unknown operator '{raw}' in '{key}'"
                    )));
                }
            },
            None => (key, Operator::Eq),
        };

        self.build_clause(column, operator, value)
    }

    fn build_clause(
        &self,
        column: &str,
        operator: Operator,
        value: &str,
    ) -> Result<Option<FilterClause>> {
        if !grammar::is_valid_identifier(column) {
            return self.reject(Error::InvalidIdentifier(column.to_string()));
        }

        let value = match operator {
            Operator::Like | Operator::Ilike => grammar::like_pattern(value),
            Operator::In | Operator::NotIn => unwrap_list(value).to_string(),
            _ => value.to_string(),
        };
        let clause = FilterClause::new(column, operator, Some(value));

        if self.options.mode == ParseMode::Strict && Predicate::from_clause(&clause).is_none() {
            return Err(Error::InvalidFilter(format!(
                "'{}' is not a valid value for {}.{}",
                clause.value.unwrap_or_default(),
                column,
                operator
            )));
        }

        Ok(Some(clause))
    }

    fn parse_group(&self, value: &str, clauses: &mut Vec<FilterClause>) -> Result<()> {
        let inner = value.trim();
        let inner = inner.strip_prefix('(').unwrap_or(inner);
        let inner = inner.strip_suffix(')').unwrap_or(inner);

        for token in split_respecting_parens(inner, ',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            let Some((column, raw_operator, value)) = split_group_token(token) else {
                self.reject::<()>(Error::InvalidFilter(format!(
                    "group condition '{token}' is not column.operator.value"
                )))?;
                continue;
            };

            let Some(operator) = Operator::parse(&raw_operator) else {
                self.reject::<()>(Error::InvalidFilter(format!(
                    "unknown operator '{raw_operator}' in '{token}'"
                )))?;
                continue;
            };

            if let Some(clause) = self.build_clause(column, operator, value)? {
                clauses.push(clause);
            }
        }
        Ok(())
    }

    fn parse_joins(&self, kind: JoinKind, value: &str, joins: &mut Vec<JoinClause>) -> Result<()> {
        for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let parsed = token.split_once(':').and_then(|(table, keys)| {
                keys.split_once('=')
                    .map(|(left, right)| (table.trim(), left.trim(), right.trim()))
            });

            let Some((table, left_key, right_key)) = parsed else {
                self.reject::<()>(Error::InvalidQueryParam(format!(
                    "{}={token}",
                    kind.key()
                )))?;
                continue;
            };

            if let Some(bad) = [table, left_key, right_key]
                .into_iter()
                .find(|name| !grammar::is_valid_identifier(name))
            {
                self.reject::<()>(Error::InvalidIdentifier(bad.to_string()))?;
                continue;
            }

            joins.push(JoinClause {
                kind,
                table: table.to_string(),
                left_key: left_key.to_string(),
                right_key: right_key.to_string(),
            });
        }
        Ok(())
    }
}

impl QueryDescription {
    /// Parse a query string with the default (lenient, full) grammar
    pub fn parse(query_string: &str) -> Result<Self> {
        QueryParser::default().parse(query_string)
    }
}

/// Best-effort integer read: leading ASCII digits, `0` when there are none
pub fn coerce_integer(value: &str) -> u64 {
    let value = value.trim_start();
    let value = value.strip_prefix('+').unwrap_or(value);
    let digits: &str = value
        .find(|c: char| !c.is_ascii_digit())
        .map_or(value, |end| &value[..end]);

    if digits.is_empty() {
        0
    } else {
        digits.parse().unwrap_or(u64::MAX)
    }
}

/// Comma-split, trimmed, empties dropped
fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
}

/// `(a,b)` and `a,b` name the same list
fn unwrap_list(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(value)
}

/// Split `column.operator.value`, where the operator may be `not.in`
fn split_group_token(token: &str) -> Option<(&str, String, &str)> {
    let (column, rest) = token.split_once('.')?;

    let negated = rest
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("not."));
    if negated {
        let (operator, value) = rest[4..].split_once('.')?;
        Some((column, format!("not.{operator}"), value))
    } else {
        let (operator, value) = rest.split_once('.')?;
        Some((column, operator.to_string(), value))
    }
}

/// Split string by delimiter, respecting parentheses nesting
fn split_respecting_parens(s: &str, delimiter: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in s.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c == delimiter && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}
