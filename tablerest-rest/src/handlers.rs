//! HTTP handlers for REST API endpoints
//!
//! Every handler funnels its `Result` through [`respond`], the single place
//! where errors become status codes and envelopes.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, error, warn, Level};

use tablerest_common::config::RestConfig;
use tablerest_common::error::{Error, ErrorClass, Result};
use tablerest_common::types::ResultEnvelope;
use tablerest_query::applier::apply;
use tablerest_query::grammar::GrammarOptions;
use tablerest_query::parser::QueryParser;
use tablerest_query::sql::SqlBuilder;

use crate::openapi;
use crate::resource::{Model, Registry};
use crate::store::Store;

/// Shared REST API state
pub struct RestState {
    pub registry: Arc<Registry>,
    pub store: Arc<dyn Store>,
    pub parser: QueryParser,
    pub prefix: String,
    pub max_rows: u64,
    pub debug: bool,
}

impl RestState {
    pub fn new(config: &RestConfig, registry: Arc<Registry>, store: Arc<dyn Store>) -> Self {
        Self {
            registry,
            store,
            parser: QueryParser::new(GrammarOptions::from(&config.grammar)),
            prefix: config.prefix.clone(),
            max_rows: config.max_rows,
            debug: config.debug,
        }
    }
}

// ============================================================================
// Error boundary
// ============================================================================

fn respond(state: &RestState, result: Result<HttpResponse>) -> HttpResponse {
    match result {
        Ok(response) => response,
        Err(err) => error_response(&err, state.debug),
    }
}

/// Map an error onto its status code and failure envelope
pub fn error_response(err: &Error, debug: bool) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if err.class() == ErrorClass::Internal {
        error!(code = err.error_code(), error = %err, "request failed");
    } else {
        warn!(code = err.error_code(), error = %err, "request rejected");
    }

    HttpResponse::build(status).json(ResultEnvelope::<JsonValue>::failure(
        err.public_message(debug),
        status.as_u16(),
    ))
}

fn envelope(status: StatusCode, data: JsonValue, count: Option<u64>) -> HttpResponse {
    HttpResponse::build(status).json(ResultEnvelope::ok(data, status.as_u16()).with_count(count))
}

/// Decode a JSON object body
fn parse_object(body: &[u8]) -> Result<Map<String, JsonValue>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::EmptyBody);
    }
    match serde_json::from_slice::<JsonValue>(body) {
        Ok(JsonValue::Object(values)) => Ok(values),
        Ok(_) => Err(Error::MalformedBody("expected a JSON object".to_string())),
        Err(e) => Err(Error::MalformedBody(e.to_string())),
    }
}

/// Mass-assignable fields of a write body
fn fillable_values(model: &dyn Model, body: &[u8]) -> Result<Map<String, JsonValue>> {
    let values = model.fill(parse_object(body)?);
    if values.is_empty() {
        return Err(Error::EmptyBody);
    }
    Ok(values)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check handler
pub async fn health_handler() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "tablerest",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// OpenAPI document handler
pub async fn openapi_handler(state: web::Data<Arc<RestState>>) -> HttpResponse {
    HttpResponse::Ok().json(openapi::generate(&state.registry, &state.prefix))
}

/// `GET {prefix}/{slug}`
pub async fn list_handler(
    state: web::Data<Arc<RestState>>,
    path: web::Path<String>,
    req: HttpRequest,
) -> HttpResponse {
    respond(&state, list(&state, &path, req.query_string()).await)
}

async fn list(state: &RestState, slug: &str, query_string: &str) -> Result<HttpResponse> {
    let model = state.registry.get(slug)?;
    let table = model.table();

    let mut query = state.parser.parse(query_string)?;
    query.limit = Some(query.limit.map_or(state.max_rows, |l| l.min(state.max_rows)));

    if tracing::enabled!(Level::DEBUG) {
        let mut sql = SqlBuilder::new(table);
        apply(&query, &mut sql);
        debug!(resource = slug, sql = %sql.to_sql(), params = ?sql.params(), "list query");
    }

    let (rows, count) = if query.count_requested {
        let (rows, count) = futures::try_join!(
            state.store.select(table, &query),
            state.store.count(table, &query)
        )?;
        (rows, Some(count))
    } else {
        (state.store.select(table, &query).await?, None)
    };

    Ok(envelope(StatusCode::OK, JsonValue::Array(rows), count))
}

/// `GET {prefix}/{slug}/{id}`
pub async fn show_handler(
    state: web::Data<Arc<RestState>>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (slug, id) = path.into_inner();
    respond(&state, show(&state, &slug, &id).await)
}

async fn show(state: &RestState, slug: &str, id: &str) -> Result<HttpResponse> {
    let model = state.registry.get(slug)?;
    let row = state
        .store
        .find(model.table(), id)
        .await?
        .ok_or_else(|| Error::RecordNotFound(id.to_string()))?;

    Ok(envelope(StatusCode::OK, row, None))
}

/// `POST {prefix}/{slug}`
pub async fn create_handler(
    state: web::Data<Arc<RestState>>,
    path: web::Path<String>,
    body: web::Bytes,
) -> HttpResponse {
    respond(&state, create(&state, &path, &body).await)
}

async fn create(state: &RestState, slug: &str, body: &[u8]) -> Result<HttpResponse> {
    let model = state.registry.get(slug)?;
    let values = fillable_values(model.as_ref(), body)?;

    let row = state.store.insert(model.table(), values).await?;
    debug!(resource = slug, "record created");

    Ok(envelope(StatusCode::CREATED, row, None))
}

/// `PUT`/`PATCH {prefix}/{slug}/{id}`
pub async fn update_handler(
    state: web::Data<Arc<RestState>>,
    path: web::Path<(String, String)>,
    body: web::Bytes,
) -> HttpResponse {
    let (slug, id) = path.into_inner();
    respond(&state, update(&state, &slug, &id, &body).await)
}

async fn update(state: &RestState, slug: &str, id: &str, body: &[u8]) -> Result<HttpResponse> {
    let model = state.registry.get(slug)?;

    let mut values = model.fill(parse_object(body)?);
    values.remove(model.primary_key());
    if values.is_empty() {
        return Err(Error::EmptyBody);
    }

    let row = state
        .store
        .update(model.table(), id, values)
        .await?
        .ok_or_else(|| Error::RecordNotFound(id.to_string()))?;

    Ok(envelope(StatusCode::OK, row, None))
}

/// `DELETE {prefix}/{slug}/{id}`
pub async fn delete_handler(
    state: web::Data<Arc<RestState>>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (slug, id) = path.into_inner();
    respond(&state, delete(&state, &slug, &id).await)
}

async fn delete(state: &RestState, slug: &str, id: &str) -> Result<HttpResponse> {
    let model = state.registry.get(slug)?;
    if !state.store.delete(model.table(), id).await? {
        return Err(Error::RecordNotFound(id.to_string()));
    }

    Ok(HttpResponse::NoContent().finish())
}
