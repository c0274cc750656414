//! Shared query-string vocabulary
//!
//! Reserved keys, operators and encoding rules used by both the server-side
//! parser and the client-side builder. Nothing in here performs I/O.

use std::fmt;

use tablerest_common::config::GrammarConfig;
use tablerest_common::error::{Error, Result};

pub const SELECT: &str = "select";
pub const WITH: &str = "with";
pub const ORDER: &str = "order";
pub const LIMIT: &str = "limit";
pub const OFFSET: &str = "offset";
pub const COUNT: &str = "count";
pub const AND: &str = "and";
pub const OR: &str = "or";
pub const JOIN: &str = "join";
pub const LEFT_JOIN: &str = "leftJoin";
pub const RIGHT_JOIN: &str = "rightJoin";

/// Keys that are never interpreted as column filters
pub const RESERVED_KEYS: [&str; 11] = [
    SELECT, WITH, ORDER, LIMIT, OFFSET, COUNT, AND, OR, JOIN, LEFT_JOIN, RIGHT_JOIN,
];

/// Wildcard accepted in `like`/`ilike` values on the wire
pub const WILDCARD: char = '*';

/// SQL wildcard substituted for [`WILDCARD`]
pub const SQL_WILDCARD: char = '%';

/// Check whether a key is reserved
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Identifiers must match `^[A-Za-z0-9_]+$`
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Validate an identifier, returning it unchanged
pub fn validate_identifier(name: &str) -> Result<&str> {
    if is_valid_identifier(name) {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

/// Replace wire wildcards with SQL wildcards
pub fn like_pattern(value: &str) -> String {
    value.replace(WILDCARD, &SQL_WILDCARD.to_string())
}

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    Is,
    In,
    NotIn,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Like,
        Operator::Ilike,
        Operator::Is,
        Operator::In,
        Operator::NotIn,
    ];

    /// Parse an operator token, case-insensitively
    pub fn parse(token: &str) -> Option<Self> {
        let op = match token.to_ascii_lowercase().as_str() {
            "eq" => Self::Eq,
            "neq" => Self::Neq,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "like" => Self::Like,
            "ilike" => Self::Ilike,
            "is" => Self::Is,
            "in" => Self::In,
            "not.in" | "notin" | "not_in" => Self::NotIn,
            _ => return None,
        };
        Some(op)
    }

    /// Canonical wire token
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::Ilike => "ilike",
            Self::Is => "is",
            Self::In => "in",
            Self::NotIn => "not.in",
        }
    }

    /// SQL operator text
    pub fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::Ilike => "ILIKE",
            Self::Is => "IS",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }

    /// Whether values for this operator carry `*` wildcards
    pub fn is_pattern(self) -> bool {
        matches!(self, Self::Like | Self::Ilike)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Parse a direction token, case-insensitively
    pub fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("asc") {
            Some(Self::Asc)
        } else if token.eq_ignore_ascii_case("desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Join flavour, keyed by its query-string parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            JOIN => Some(Self::Inner),
            LEFT_JOIN => Some(Self::Left),
            RIGHT_JOIN => Some(Self::Right),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Inner => JOIN,
            Self::Left => LEFT_JOIN,
            Self::Right => RIGHT_JOIN,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
        }
    }
}

/// How a predicate attaches to the accumulated condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boolean {
    And,
    Or,
}

/// Handling of malformed fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Drop the fragment and keep going
    #[default]
    Lenient,
    /// Fail the whole request
    Strict,
}

/// Grammar capabilities enabled for a parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrammarOptions {
    pub groups: bool,
    pub joins: bool,
    pub mode: ParseMode,
}

impl Default for GrammarOptions {
    fn default() -> Self {
        Self {
            groups: true,
            joins: true,
            mode: ParseMode::Lenient,
        }
    }
}

impl From<&GrammarConfig> for GrammarOptions {
    fn from(config: &GrammarConfig) -> Self {
        Self {
            groups: config.groups,
            joins: config.joins,
            mode: if config.strict {
                ParseMode::Strict
            } else {
                ParseMode::Lenient
            },
        }
    }
}
