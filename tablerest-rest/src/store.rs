//! Storage backends
//!
//! [`Store`] executes query descriptions for the REST handlers.
//! [`InMemoryStore`] evaluates them against rows held in memory, with the
//! same join, filter and ordering semantics a SQL database would apply.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use tablerest_common::error::{Error, Result};
use tablerest_common::types::TableInfo;
use tablerest_query::applier::{apply, apply_count, Predicate, QueryBuilder};
use tablerest_query::description::QueryDescription;
use tablerest_query::grammar::{Boolean, Direction, JoinKind, Operator};

use crate::resource::Registry;

type Row = Map<String, JsonValue>;

static NULL: JsonValue = JsonValue::Null;

/// Query executor behind the REST handlers
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Rows matching the full description
    async fn select(&self, table: &str, query: &QueryDescription) -> Result<Vec<JsonValue>>;

    /// Rows matching joins and filters only
    async fn count(&self, table: &str, query: &QueryDescription) -> Result<u64>;

    async fn find(&self, table: &str, id: &str) -> Result<Option<JsonValue>>;

    async fn insert(&self, table: &str, values: Row) -> Result<JsonValue>;

    async fn update(&self, table: &str, id: &str, values: Row) -> Result<Option<JsonValue>>;

    async fn delete(&self, table: &str, id: &str) -> Result<bool>;
}

struct MemTable {
    info: TableInfo,
    rows: Vec<Row>,
}

impl MemTable {
    fn position(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|row| {
            row.get(&self.info.primary_key)
                .is_some_and(|value| loosely_equal(value, id))
        })
    }
}

/// In-memory store for development and testing
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, MemTable>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// One empty table per registered model
    pub fn from_registry(registry: &Registry) -> Self {
        let store = Self::new();
        for model in registry.models() {
            store.define(model.describe());
        }
        store
    }

    /// Create a table; an existing table keeps its rows
    pub fn define(&self, info: TableInfo) {
        self.tables
            .write()
            .entry(info.name.clone())
            .or_insert_with(|| MemTable {
                info,
                rows: Vec::new(),
            });
    }

    /// Builder-style [`define`](Self::define)
    #[must_use]
    pub fn with_table(self, info: TableInfo) -> Self {
        self.define(info);
        self
    }

    /// Insert seed rows through the regular integrity checks
    pub fn seed(&self, table: &str, rows: Vec<JsonValue>) -> Result<()> {
        for row in rows {
            match row {
                JsonValue::Object(values) => {
                    self.insert_row(table, values)?;
                }
                other => {
                    return Err(Error::MalformedBody(format!(
                        "seed rows must be objects, got {other}"
                    )))
                }
            }
        }
        Ok(())
    }

    /// Builder-style [`seed`](Self::seed)
    pub fn with_rows(self, table: &str, rows: Vec<JsonValue>) -> Result<Self> {
        self.seed(table, rows)?;
        Ok(self)
    }

    #[cfg(test)]
    fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, |t| t.rows.len())
    }

    fn insert_row(&self, table: &str, mut row: Row) -> Result<JsonValue> {
        let mut tables = self.tables.write();

        let primary_key = lookup(&tables, table)?.info.primary_key.clone();
        if row.get(&primary_key).map_or(true, JsonValue::is_null) {
            row.insert(
                primary_key,
                JsonValue::String(uuid::Uuid::new_v4().to_string()),
            );
        }
        check_row(&tables, table, &row, None)?;

        let target = lookup_mut(&mut tables, table)?;
        target.rows.push(row.clone());
        Ok(JsonValue::Object(row))
    }

    fn run(&self, table: &str, query: &RowQuery, shape: bool) -> Result<Vec<Row>> {
        let tables = self.tables.read();
        let base = lookup(&tables, table)?;

        let mut known = declared(&base.info);
        let mut rows = base.rows.clone();

        for (kind, other, left_key, right_key) in &query.joins {
            let joined = tables
                .get(other)
                .ok_or_else(|| Error::InvalidQueryParam(format!("unknown join table '{other}'")))?;
            ensure_known(known.as_ref(), left_key)?;
            ensure_known(declared(&joined.info).as_ref(), right_key)?;

            rows = join_rows(rows, joined, *kind, left_key, right_key);
            known = match (known, declared(&joined.info)) {
                (Some(mut left), Some(right)) => {
                    left.extend(right);
                    Some(left)
                }
                _ => None,
            };
        }

        for condition in &query.conditions {
            ensure_known(known.as_ref(), &condition.column)?;
            if let Test::Pattern(Err(message)) = &condition.test {
                return Err(Error::InvalidFilter(message.clone()));
            }
        }
        rows.retain(|row| query.matches(row));

        if !shape {
            return Ok(rows);
        }

        for (column, _) in &query.order {
            ensure_known(known.as_ref(), column)?;
        }
        rows.sort_by(|a, b| {
            for (column, direction) in &query.order {
                let ordering = compare_values(
                    a.get(column).unwrap_or(&NULL),
                    b.get(column).unwrap_or(&NULL),
                );
                let ordering = match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let offset = query
            .offset
            .map_or(0, |o| usize::try_from(o).unwrap_or(usize::MAX));
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let mut rows: Vec<Row> = rows.into_iter().skip(offset).take(limit).collect();

        for name in &query.relations {
            let relation = base
                .info
                .relation(name)
                .ok_or_else(|| Error::InvalidQueryParam(format!("unknown relation '{name}'")))?;
            let related = lookup(&tables, &relation.table)?;

            for row in &mut rows {
                let key = row.get(&relation.local_key).unwrap_or(&NULL).clone();
                let mut matching = related
                    .rows
                    .iter()
                    .filter(|r| same_value(r.get(&relation.foreign_key).unwrap_or(&NULL), &key))
                    .map(|r| JsonValue::Object(r.clone()));

                let loaded = if relation.many {
                    JsonValue::Array(matching.collect())
                } else {
                    matching.next().unwrap_or(JsonValue::Null)
                };
                row.insert(name.clone(), loaded);
            }
        }

        if !query.columns.is_empty() && !query.columns.iter().any(|c| c == "*") {
            for column in &query.columns {
                ensure_known(known.as_ref(), column)?;
            }
            for row in &mut rows {
                row.retain(|key, _| {
                    query.columns.iter().any(|c| c == key) || query.relations.contains(key)
                });
            }
        }

        Ok(rows)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn select(&self, table: &str, query: &QueryDescription) -> Result<Vec<JsonValue>> {
        let mut rows = RowQuery::default();
        apply(query, &mut rows);
        debug!(
            table,
            conditions = rows.conditions.len(),
            joins = rows.joins.len(),
            "in-memory select"
        );

        Ok(self
            .run(table, &rows, true)?
            .into_iter()
            .map(JsonValue::Object)
            .collect())
    }

    async fn count(&self, table: &str, query: &QueryDescription) -> Result<u64> {
        let mut rows = RowQuery::default();
        apply_count(query, &mut rows);

        let matched = self.run(table, &rows, false)?.len();
        Ok(matched as u64)
    }

    async fn find(&self, table: &str, id: &str) -> Result<Option<JsonValue>> {
        let tables = self.tables.read();
        let target = lookup(&tables, table)?;

        Ok(target
            .position(id)
            .map(|index| JsonValue::Object(target.rows[index].clone())))
    }

    async fn insert(&self, table: &str, values: Row) -> Result<JsonValue> {
        self.insert_row(table, values)
    }

    async fn update(&self, table: &str, id: &str, values: Row) -> Result<Option<JsonValue>> {
        let mut tables = self.tables.write();

        let target = lookup(&tables, table)?;
        let Some(index) = target.position(id) else {
            return Ok(None);
        };
        let mut row = target.rows[index].clone();
        row.extend(values);
        check_row(&tables, table, &row, Some(index))?;

        lookup_mut(&mut tables, table)?.rows[index] = row.clone();
        Ok(Some(JsonValue::Object(row)))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool> {
        let mut tables = self.tables.write();
        let target = lookup_mut(&mut tables, table)?;

        match target.position(id) {
            Some(index) => {
                target.rows.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// Query evaluation
// ============================================================================

enum Test {
    Compare(Operator, String),
    Pattern(std::result::Result<Regex, String>),
    IsNull,
    IsNotNull,
    In(Vec<String>),
    NotIn(Vec<String>),
}

impl Test {
    fn matches(&self, field: Option<&JsonValue>) -> bool {
        let field = field.filter(|v| !v.is_null());
        match (self, field) {
            (Self::IsNull, field) => field.is_none(),
            (Self::IsNotNull, field) => field.is_some(),
            // SQL comparisons against NULL are never true
            (_, None) => false,
            (Self::Compare(operator, value), Some(field)) => compare(field, *operator, value),
            (Self::Pattern(Ok(regex)), Some(field)) => regex.is_match(&text(field)),
            (Self::Pattern(Err(_)), Some(_)) => false,
            (Self::In(values), Some(field)) => values.iter().any(|v| loosely_equal(field, v)),
            (Self::NotIn(values), Some(field)) => !values.iter().any(|v| loosely_equal(field, v)),
        }
    }
}

struct Condition {
    boolean: Boolean,
    column: String,
    test: Test,
}

/// Collects builder calls for evaluation against in-memory rows
#[derive(Default)]
struct RowQuery {
    joins: Vec<(JoinKind, String, String, String)>,
    conditions: Vec<Condition>,
    columns: Vec<String>,
    relations: Vec<String>,
    order: Vec<(String, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl RowQuery {
    /// Conditions fold left to right; ORs always trail the ANDs
    fn matches(&self, row: &Row) -> bool {
        let mut conditions = self.conditions.iter();
        let Some(first) = conditions.next() else {
            return true;
        };

        conditions.fold(first.test.matches(row.get(&first.column)), |acc, c| {
            match c.boolean {
                Boolean::And => acc && c.test.matches(row.get(&c.column)),
                Boolean::Or => acc || c.test.matches(row.get(&c.column)),
            }
        })
    }
}

impl QueryBuilder for RowQuery {
    fn join(&mut self, kind: JoinKind, table: &str, left_key: &str, right_key: &str) {
        self.joins.push((
            kind,
            table.to_string(),
            left_key.to_string(),
            right_key.to_string(),
        ));
    }

    fn where_clause(&mut self, boolean: Boolean, column: &str, predicate: Predicate) {
        let test = match predicate {
            Predicate::Compare { operator, value } if operator.is_pattern() => Test::Pattern(
                like_regex(&value, operator == Operator::Ilike).map_err(|e| e.to_string()),
            ),
            Predicate::Compare { operator, value } => Test::Compare(operator, value),
            Predicate::IsNull => Test::IsNull,
            Predicate::IsNotNull => Test::IsNotNull,
            Predicate::In(values) => Test::In(values),
            Predicate::NotIn(values) => Test::NotIn(values),
        };
        self.conditions.push(Condition {
            boolean,
            column: column.to_string(),
            test,
        });
    }

    fn select(&mut self, columns: &[String]) {
        self.columns = columns.to_vec();
    }

    fn with(&mut self, relations: &[String]) {
        self.relations.extend_from_slice(relations);
    }

    fn order_by(&mut self, column: &str, direction: Direction) {
        self.order.push((column.to_string(), direction));
    }

    fn limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    fn offset(&mut self, offset: u64) {
        self.offset = Some(offset);
    }
}

/// Translate a SQL LIKE pattern into an anchored regex
fn like_regex(pattern: &str, case_insensitive: bool) -> std::result::Result<Regex, regex::Error> {
    let mut expr = String::from("^");
    let mut buf = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    expr.push('$');

    RegexBuilder::new(&expr)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
}

fn compare(field: &JsonValue, operator: Operator, value: &str) -> bool {
    match operator {
        Operator::Eq => loosely_equal(field, value),
        Operator::Neq => !loosely_equal(field, value),
        Operator::Gt => order_against(field, value) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            order_against(field, value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => order_against(field, value) == Some(Ordering::Less),
        Operator::Lte => matches!(
            order_against(field, value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Like | Operator::Ilike | Operator::Is | Operator::In | Operator::NotIn => false,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Some(true),
        "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

/// Compare a stored value with a query-string value
fn loosely_equal(field: &JsonValue, value: &str) -> bool {
    match field {
        JsonValue::String(s) => s == value,
        JsonValue::Number(_) => order_against(field, value) == Some(Ordering::Equal),
        JsonValue::Bool(b) => parse_bool(value) == Some(*b),
        JsonValue::Null => false,
        other => other.to_string() == value,
    }
}

fn order_against(field: &JsonValue, value: &str) -> Option<Ordering> {
    match field {
        JsonValue::Number(n) => {
            let value = value.trim().parse::<f64>().ok()?;
            n.as_f64()?.partial_cmp(&value)
        }
        JsonValue::String(s) => Some(s.as_str().cmp(value)),
        JsonValue::Bool(b) => parse_bool(value).map(|v| b.cmp(&v)),
        _ => None,
    }
}

fn text(field: &JsonValue) -> String {
    match field {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ordering used for sorting; NULL sorts after every value
fn compare_values(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
        (JsonValue::Null, _) => Ordering::Greater,
        (_, JsonValue::Null) => Ordering::Less,
        (JsonValue::Number(x), JsonValue::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn same_value(a: &JsonValue, b: &JsonValue) -> bool {
    !a.is_null() && !b.is_null() && compare_values(a, b) == Ordering::Equal
}

fn join_rows(
    left: Vec<Row>,
    joined: &MemTable,
    kind: JoinKind,
    left_key: &str,
    right_key: &str,
) -> Vec<Row> {
    let on = |l: &Row, r: &Row| {
        same_value(
            l.get(left_key).unwrap_or(&NULL),
            r.get(right_key).unwrap_or(&NULL),
        )
    };

    let mut out = Vec::new();
    match kind {
        JoinKind::Inner | JoinKind::Left => {
            let padding = columns_of(Some(&joined.info), &joined.rows);
            for l in &left {
                let before = out.len();
                out.extend(joined.rows.iter().filter(|r| on(l, r)).map(|r| merge(l, r)));
                if out.len() == before && kind == JoinKind::Left {
                    out.push(pad(l, &padding));
                }
            }
        }
        JoinKind::Right => {
            let padding = columns_of(None, &left);
            for r in &joined.rows {
                let before = out.len();
                out.extend(left.iter().filter(|l| on(l, r)).map(|l| merge(l, r)));
                if out.len() == before {
                    out.push(pad(r, &padding));
                }
            }
        }
    }
    out
}

/// Base-table fields win over joined fields of the same name
fn merge(left: &Row, right: &Row) -> Row {
    let mut row = left.clone();
    for (key, value) in right {
        row.entry(key.clone()).or_insert_with(|| value.clone());
    }
    row
}

fn pad(row: &Row, columns: &[String]) -> Row {
    let mut row = row.clone();
    for column in columns {
        row.entry(column.clone()).or_insert(JsonValue::Null);
    }
    row
}

fn columns_of(info: Option<&TableInfo>, rows: &[Row]) -> Vec<String> {
    let mut seen = HashSet::new();
    info.into_iter()
        .flat_map(|i| i.columns.iter().map(|c| c.name.clone()))
        .chain(rows.iter().flat_map(|r| r.keys().cloned()))
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

// ============================================================================
// Schema and integrity checks
// ============================================================================

fn lookup<'a>(tables: &'a HashMap<String, MemTable>, name: &str) -> Result<&'a MemTable> {
    tables
        .get(name)
        .ok_or_else(|| Error::DatabaseError(format!("relation \"{name}\" does not exist")))
}

fn lookup_mut<'a>(
    tables: &'a mut HashMap<String, MemTable>,
    name: &str,
) -> Result<&'a mut MemTable> {
    tables
        .get_mut(name)
        .ok_or_else(|| Error::DatabaseError(format!("relation \"{name}\" does not exist")))
}

/// Declared column names; `None` for schemaless tables
fn declared(info: &TableInfo) -> Option<HashSet<String>> {
    if info.columns.is_empty() {
        return None;
    }
    let mut columns: HashSet<String> = info.columns.iter().map(|c| c.name.clone()).collect();
    columns.insert(info.primary_key.clone());
    Some(columns)
}

fn ensure_known(known: Option<&HashSet<String>>, column: &str) -> Result<()> {
    match known {
        Some(columns) if !columns.contains(column) => {
            Err(Error::ColumnNotFound(column.to_string()))
        }
        _ => Ok(()),
    }
}

/// Validate a row about to be written to `table`, ignoring the row at `skip`
fn check_row(
    tables: &HashMap<String, MemTable>,
    table: &str,
    row: &Row,
    skip: Option<usize>,
) -> Result<()> {
    let target = lookup(tables, table)?;
    let info = &target.info;

    let known = declared(info);
    for column in row.keys() {
        ensure_known(known.as_ref(), column)?;
    }

    let unique = std::iter::once(info.primary_key.as_str()).chain(
        info.columns
            .iter()
            .filter(|c| c.is_unique)
            .map(|c| c.name.as_str()),
    );
    for column in unique {
        let Some(value) = row.get(column) else {
            continue;
        };
        let taken = target
            .rows
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != skip)
            .any(|(_, existing)| same_value(existing.get(column).unwrap_or(&NULL), value));
        if taken {
            return Err(Error::DuplicateKey(format!("{column}={}", text(value))));
        }
    }

    for relation in info.relations.iter().filter(|r| !r.many) {
        let Some(value) = row.get(&relation.local_key).filter(|v| !v.is_null()) else {
            continue;
        };
        let Some(parent) = tables.get(&relation.table) else {
            continue;
        };
        let exists = parent
            .rows
            .iter()
            .any(|r| same_value(r.get(&relation.foreign_key).unwrap_or(&NULL), value));
        if !exists {
            return Err(Error::ForeignKeyViolation(format!(
                "{}.{}={} has no match in {}",
                table,
                relation.local_key,
                text(value),
                relation.table
            )));
        }
    }

    Ok(())
}
