//! Fluent query builder
//!
//! Accumulates the same [`QueryDescription`] the server parses and writes it
//! back out in the query-string grammar. Builder methods never do I/O; each
//! terminal method consumes the builder and issues exactly one request.

use serde::Serialize;
use tracing::debug;
use url::Url;

use tablerest_common::types::ResultEnvelope;
use tablerest_query::description::{FilterClause, JoinClause, OrderClause, QueryDescription};
use tablerest_query::grammar::{self, Direction, JoinKind, Operator};

use crate::client::Client;
use crate::response;

/// Query against one resource
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    client: Client,
    resource: String,
    description: QueryDescription,
    // Signed so page(0, n) can express a negative offset
    limit: Option<i64>,
    offset: Option<i64>,
}

impl QueryBuilder {
    pub(crate) fn new(client: Client, resource: &str) -> Self {
        Self {
            client,
            resource: resource.to_string(),
            description: QueryDescription::default(),
            limit: None,
            offset: None,
        }
    }

    /// Accumulated description; `limit`/`offset` are tracked separately
    pub fn description(&self) -> &QueryDescription {
        &self.description
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    // ------------------------------------------------------------------
    // Shaping
    // ------------------------------------------------------------------

    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.description
            .select_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Eager-load relations
    #[must_use]
    pub fn with<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.description
            .with_relations
            .extend(relations.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.description.order.push(OrderClause {
            column: column.to_string(),
            direction,
        });
        self
    }

    /// Order by a raw direction token; anything but `desc` sorts ascending
    #[must_use]
    pub fn order_by(self, column: &str, direction: &str) -> Self {
        let direction = Direction::parse(direction).unwrap_or_default();
        self.order(column, direction)
    }

    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// 1-indexed page: `offset = (page - 1) * size`, `limit = size`
    #[must_use]
    pub fn page(self, page: i64, size: i64) -> Self {
        let offset = page.saturating_sub(1).saturating_mul(size);
        self.limit(size).offset(offset)
    }

    /// Ask for the total match count alongside the rows
    #[must_use]
    pub fn count(mut self) -> Self {
        self.description.count_requested = true;
        self
    }

    #[must_use]
    pub fn with_count(self) -> Self {
        self.count()
    }

    // ------------------------------------------------------------------
    // Filters
    // ------------------------------------------------------------------

    #[must_use]
    pub fn filter(mut self, column: &str, operator: Operator, value: impl ToString) -> Self {
        self.description.filters.push(FilterClause::new(
            column,
            operator,
            Some(value.to_string()),
        ));
        self
    }

    #[must_use]
    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, Operator::Eq, value)
    }

    #[must_use]
    pub fn neq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, Operator::Neq, value)
    }

    #[must_use]
    pub fn gt(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, Operator::Gt, value)
    }

    #[must_use]
    pub fn gte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, Operator::Gte, value)
    }

    #[must_use]
    pub fn lt(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, Operator::Lt, value)
    }

    #[must_use]
    pub fn lte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, Operator::Lte, value)
    }

    /// `*` is a wildcard, the server reads it as `%`
    #[must_use]
    pub fn like(self, column: &str, pattern: &str) -> Self {
        self.filter(column, Operator::Like, pattern)
    }

    #[must_use]
    pub fn ilike(self, column: &str, pattern: &str) -> Self {
        self.filter(column, Operator::Ilike, pattern)
    }

    /// `value` is `null` or `not.null`
    #[must_use]
    pub fn is(self, column: &str, value: &str) -> Self {
        self.filter(column, Operator::Is, value)
    }

    #[must_use]
    pub fn in_<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let list = join_values(values);
        self.filter(column, Operator::In, list)
    }

    #[must_use]
    pub fn not_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let list = join_values(values);
        self.filter(column, Operator::NotIn, list)
    }

    /// Clauses that must all hold, sent as `and=(...)`
    #[must_use]
    pub fn and_group(mut self, clauses: impl IntoIterator<Item = FilterClause>) -> Self {
        self.description.and_group.clauses.extend(clauses);
        self
    }

    /// Clauses of which any may hold, sent as `or=(...)`
    #[must_use]
    pub fn or_group(mut self, clauses: impl IntoIterator<Item = FilterClause>) -> Self {
        self.description.or_group.clauses.extend(clauses);
        self
    }

    // ------------------------------------------------------------------
    // Joins
    // ------------------------------------------------------------------

    fn push_join(mut self, kind: JoinKind, table: &str, left_key: &str, right_key: &str) -> Self {
        self.description.joins.push(JoinClause {
            kind,
            table: table.to_string(),
            left_key: left_key.to_string(),
            right_key: right_key.to_string(),
        });
        self
    }

    #[must_use]
    pub fn join(self, table: &str, left_key: &str, right_key: &str) -> Self {
        self.push_join(JoinKind::Inner, table, left_key, right_key)
    }

    #[must_use]
    pub fn left_join(self, table: &str, left_key: &str, right_key: &str) -> Self {
        self.push_join(JoinKind::Left, table, left_key, right_key)
    }

    #[must_use]
    pub fn right_join(self, table: &str, left_key: &str, right_key: &str) -> Self {
        self.push_join(JoinKind::Right, table, left_key, right_key)
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Query parameters in wire order
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let d = &self.description;
        let mut pairs = Vec::new();

        if !d.select_columns.is_empty() {
            pairs.push((grammar::SELECT.to_string(), d.select_columns.join(",")));
        }
        if !d.with_relations.is_empty() {
            pairs.push((grammar::WITH.to_string(), d.with_relations.join(",")));
        }

        for clause in &d.filters {
            pairs.push((
                format!("{}.{}", clause.column, clause.operator.as_str()),
                clause.value.clone().unwrap_or_default(),
            ));
        }
        if !d.and_group.is_empty() {
            pairs.push((grammar::AND.to_string(), group_value(&d.and_group.clauses)));
        }
        if !d.or_group.is_empty() {
            pairs.push((grammar::OR.to_string(), group_value(&d.or_group.clauses)));
        }

        for join in &d.joins {
            pairs.push((
                join.kind.key().to_string(),
                format!("{}:{}={}", join.table, join.left_key, join.right_key),
            ));
        }

        for clause in &d.order {
            pairs.push((
                grammar::ORDER.to_string(),
                format!("{}.{}", clause.column, clause.direction.as_str()),
            ));
        }

        if let Some(limit) = self.limit {
            pairs.push((grammar::LIMIT.to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push((grammar::OFFSET.to_string(), offset.to_string()));
        }
        if d.count_requested {
            pairs.push((grammar::COUNT.to_string(), String::new()));
        }

        pairs
    }

    /// Full list URL including the query string
    pub fn to_url(&self) -> Url {
        let mut url = self.client.resource_url(&self.resource, None);
        let pairs = self.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        url
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// List matching rows
    pub async fn get(self) -> ResultEnvelope {
        let url = self.to_url();
        debug!(method = "GET", %url, "tablerest request");
        response::normalize(self.client.http().get(url).send().await).await
    }

    /// Fetch one record by primary key
    pub async fn find(self, id: impl ToString) -> ResultEnvelope {
        let url = self.client.resource_url(&self.resource, Some(&id.to_string()));
        debug!(method = "GET", %url, "tablerest request");
        response::normalize(self.client.http().get(url).send().await).await
    }

    /// Create a record
    pub async fn create<B: Serialize + ?Sized>(self, body: &B) -> ResultEnvelope {
        let url = self.client.resource_url(&self.resource, None);
        debug!(method = "POST", %url, "tablerest request");
        response::normalize(self.client.http().post(url).json(body).send().await).await
    }

    /// Update a record by primary key
    pub async fn update<B: Serialize + ?Sized>(
        self,
        id: impl ToString,
        body: &B,
    ) -> ResultEnvelope {
        let url = self.client.resource_url(&self.resource, Some(&id.to_string()));
        debug!(method = "PATCH", %url, "tablerest request");
        response::normalize(self.client.http().patch(url).json(body).send().await).await
    }

    /// Delete a record by primary key
    pub async fn delete(self, id: impl ToString) -> ResultEnvelope {
        let url = self.client.resource_url(&self.resource, Some(&id.to_string()));
        debug!(method = "DELETE", %url, "tablerest request");
        response::normalize(self.client.http().delete(url).send().await).await
    }

    /// List, then require exactly one row
    pub async fn single(self) -> ResultEnvelope {
        response::single(self.get().await)
    }

    /// List, then accept zero or one row
    pub async fn maybe_single(self) -> ResultEnvelope {
        response::maybe_single(self.get().await)
    }
}

fn join_values<I, V>(values: I) -> String
where
    I: IntoIterator<Item = V>,
    V: ToString,
{
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// `(column.operator.value,...)`
///
/// Membership lists are parenthesized so their commas stay inside the clause.
fn group_value(clauses: &[FilterClause]) -> String {
    let inner = clauses
        .iter()
        .map(|c| {
            let value = c.value.as_deref().unwrap_or_default();
            let wrapped = value.starts_with('(') && value.ends_with(')');
            if matches!(c.operator, Operator::In | Operator::NotIn) && !wrapped {
                format!("{}.{}.({value})", c.column, c.operator.as_str())
            } else {
                format!("{}.{}.{value}", c.column, c.operator.as_str())
            }
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("({inner})")
}
