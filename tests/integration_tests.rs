//! Integration tests: client builder, parser and REST layer together

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use actix_web::{http::StatusCode, test as atest, App, HttpServer};
use async_trait::async_trait;
use proptest::prelude::*;
use serde_json::{json, Map, Value as JsonValue};

use tablerest::common::config::{ClientConfig, TableRestConfig};
use tablerest::common::error::Result;
use tablerest::query::grammar::{is_reserved, Direction, JoinKind, Operator};
use tablerest::query::{FilterClause, JoinClause, OrderClause, QueryDescription, QueryParser};
use tablerest::rest::{configure, InMemoryStore, Registry, Store};
use tablerest::sdk::Client;
use tablerest::TableRest;

const CONFIG: &str = r#"
    [rest]
    prefix = "/api"
    max_rows = 100

    [[resources]]
    slug = "users"
    fillable = ["name", "email", "age", "team_id"]
    relations = [{ name = "team", table = "teams", local_key = "team_id", foreign_key = "id" }]
    columns = [
        { name = "id", data_type = "uuid", nullable = false },
        { name = "name", nullable = false },
        { name = "email", unique = true, nullable = false },
        { name = "age", data_type = "integer" },
        { name = "team_id", data_type = "uuid" },
    ]

    [[resources]]
    slug = "teams"
    columns = [{ name = "id", data_type = "uuid", nullable = false }, { name = "title" }]
"#;

fn config() -> TableRestConfig {
    toml::from_str(CONFIG).unwrap()
}

fn server() -> TableRest {
    TableRest::new(config()).unwrap()
}

fn parse_builder_output(url: &url::Url) -> QueryDescription {
    QueryParser::default()
        .parse(url.query().unwrap_or_default())
        .unwrap()
}

fn client() -> Client {
    Client::new(&ClientConfig::default()).unwrap()
}

// ============================================================================
// Builder / parser symmetry
// ============================================================================

fn arb_column() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,10}".prop_filter("reserved key", |c| !is_reserved(c))
}

fn arb_operator() -> impl Strategy<Value = Operator> {
    proptest::sample::select(Operator::ALL.to_vec())
}

fn arb_value(operator: Operator) -> BoxedStrategy<String> {
    match operator {
        Operator::Is => prop_oneof![Just("null".to_string()), Just("not.null".to_string())].boxed(),
        Operator::In | Operator::NotIn => prop::collection::vec("[A-Za-z0-9]{1,6}", 1..4)
            .prop_map(|items| items.join(","))
            .boxed(),
        _ => "[A-Za-z0-9 .@_-]{1,12}".boxed(),
    }
}

// Group tokens are trimmed, so group values carry no spaces
fn arb_group_value(operator: Operator) -> BoxedStrategy<String> {
    match operator {
        Operator::Is | Operator::In | Operator::NotIn => arb_value(operator),
        _ => "[A-Za-z0-9.@_-]{1,12}".boxed(),
    }
}

fn arb_clause() -> impl Strategy<Value = FilterClause> {
    (arb_column(), arb_operator()).prop_flat_map(|(column, operator)| {
        arb_group_value(operator)
            .prop_map(move |value| FilterClause::new(column.clone(), operator, Some(value)))
    })
}

fn arb_join() -> impl Strategy<Value = JoinClause> {
    let kind = prop_oneof![
        Just(JoinKind::Inner),
        Just(JoinKind::Left),
        Just(JoinKind::Right)
    ];
    (kind, arb_column(), arb_column(), arb_column()).prop_map(
        |(kind, table, left_key, right_key)| JoinClause {
            kind,
            table,
            left_key,
            right_key,
        },
    )
}

fn arb_order() -> impl Strategy<Value = OrderClause> {
    let direction = prop_oneof![Just(Direction::Asc), Just(Direction::Desc)];
    (arb_column(), direction).prop_map(|(column, direction)| OrderClause { column, direction })
}

proptest! {
    #[test]
    fn builder_description_parses_back(
        filters in prop::collection::vec(arb_clause(), 0..3),
        and_clauses in prop::collection::vec(arb_clause(), 0..4),
        or_clauses in prop::collection::vec(arb_clause(), 0..4),
        joins in prop::collection::vec(arb_join(), 0..3),
        order in prop::collection::vec(arb_order(), 0..4),
    ) {
        let mut builder = client()
            .from("users")
            .and_group(and_clauses)
            .or_group(or_clauses);
        for clause in filters {
            let value = clause.value.unwrap_or_default();
            builder = builder.filter(&clause.column, clause.operator, value);
        }
        for join in joins {
            builder = match join.kind {
                JoinKind::Inner => builder.join(&join.table, &join.left_key, &join.right_key),
                JoinKind::Left => builder.left_join(&join.table, &join.left_key, &join.right_key),
                JoinKind::Right => builder.right_join(&join.table, &join.left_key, &join.right_key),
            };
        }
        for clause in order {
            builder = builder.order(&clause.column, clause.direction);
        }

        let parsed = parse_builder_output(&builder.to_url());
        let expected = QueryDescription {
            select_columns: vec!["*".to_string()],
            ..builder.description().clone()
        };
        prop_assert_eq!(parsed, expected);
    }

    #[test]
    fn builder_filters_parse_back(
        (column, operator, value) in (arb_column(), arb_operator())
            .prop_flat_map(|(c, op)| (Just(c), Just(op), arb_value(op)))
    ) {
        let url = client().from("users").filter(&column, operator, value.clone()).to_url();
        let parsed = parse_builder_output(&url);

        prop_assert_eq!(parsed.filters, vec![FilterClause::new(column, operator, Some(value))]);
    }

    #[test]
    fn page_math(page in -1000i64..1000, size in 0i64..500) {
        let builder = client().from("users").page(page, size);

        prop_assert_eq!(builder.limit_value(), Some(size));
        prop_assert_eq!(builder.offset_value(), Some((page - 1) * size));

        // Negative offsets coerce to zero on the server side
        let parsed = parse_builder_output(&builder.to_url());
        prop_assert_eq!(parsed.limit, Some(u64::try_from(size).unwrap()));
        prop_assert_eq!(parsed.offset, Some(u64::try_from((page - 1) * size).unwrap_or(0)));
    }
}

#[test]
fn test_like_wildcard_is_one_directional() {
    let url = client().from("users").like("name", "Jo*").to_url();
    let parsed = parse_builder_output(&url);
    assert_eq!(parsed.filters[0].value.as_deref(), Some("Jo%"));
}

#[test]
fn test_group_membership_round_trip() {
    let builder = client()
        .from("users")
        .and_group([FilterClause::new("status", Operator::In, Some("a,b".into()))])
        .or_group([
            FilterClause::new("role", Operator::NotIn, Some("x,y,z".into())),
            FilterClause::new("age", Operator::Lt, Some("30".into())),
        ]);

    let parsed = parse_builder_output(&builder.to_url());
    assert_eq!(parsed.and_group, builder.description().and_group);
    assert_eq!(parsed.or_group, builder.description().or_group);
}

#[test]
fn test_full_builder_round_trip() {
    let builder = client()
        .from("users")
        .select(["id", "name"])
        .with(["team"])
        .in_("status", ["a", "b"])
        .and_group([
            FilterClause::new("age", Operator::Gte, Some("18".into())),
            FilterClause::new("status", Operator::Eq, Some("active".into())),
        ])
        .or_group([
            FilterClause::new("type", Operator::Eq, Some("admin".into())),
            FilterClause::new("type", Operator::Eq, Some("manager".into())),
        ])
        .left_join("teams", "team_id", "id")
        .order_by("name", "desc")
        .order_by("age", "asc")
        .limit(5)
        .count();

    let parsed = parse_builder_output(&builder.to_url());
    let expected = QueryDescription {
        limit: Some(5),
        ..builder.description().clone()
    };
    assert_eq!(parsed, expected);
}

// ============================================================================
// REST layer
// ============================================================================

#[actix_rt::test]
async fn test_count_on_empty_resource() {
    let server = server();
    let app =
        atest::init_service(App::new().configure(configure(server.rest().state(), true))).await;

    let req = atest::TestRequest::get().uri("/api/users?count").to_request();
    let resp = atest::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: JsonValue = atest::read_body_json(resp).await;
    assert_eq!(body, json!({"data": [], "count": 0, "error": null}));
}

#[actix_rt::test]
async fn test_invalid_identifier_rejected() {
    let server = server();
    let app =
        atest::init_service(App::new().configure(configure(server.rest().state(), true))).await;

    let req = atest::TestRequest::get().uri("/api/users-x?name=x").to_request();
    let resp = atest::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: JsonValue = atest::read_body_json(resp).await;
    assert_eq!(body["data"], JsonValue::Null);
    assert!(body["error"].as_str().unwrap().contains("users-x"));
}

/// Store wrapper recording how often the handlers reach it
struct CountingStore {
    inner: InMemoryStore,
    calls: Arc<AtomicUsize>,
}

impl CountingStore {
    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for CountingStore {
    async fn select(&self, table: &str, query: &QueryDescription) -> Result<Vec<JsonValue>> {
        self.hit();
        self.inner.select(table, query).await
    }

    async fn count(&self, table: &str, query: &QueryDescription) -> Result<u64> {
        self.hit();
        self.inner.count(table, query).await
    }

    async fn find(&self, table: &str, id: &str) -> Result<Option<JsonValue>> {
        self.hit();
        self.inner.find(table, id).await
    }

    async fn insert(&self, table: &str, values: Map<String, JsonValue>) -> Result<JsonValue> {
        self.hit();
        self.inner.insert(table, values).await
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        values: Map<String, JsonValue>,
    ) -> Result<Option<JsonValue>> {
        self.hit();
        self.inner.update(table, id, values).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<bool> {
        self.hit();
        self.inner.delete(table, id).await
    }
}

#[actix_rt::test]
async fn test_invalid_identifier_never_reaches_store() {
    let config = config();
    let registry = Registry::from_config(&config.resources).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let store = CountingStore {
        inner: InMemoryStore::from_registry(&registry),
        calls: calls.clone(),
    };
    let server = TableRest::with_store(config, Arc::new(store)).unwrap();
    let app =
        atest::init_service(App::new().configure(configure(server.rest().state(), true))).await;

    let requests = [
        atest::TestRequest::get().uri("/api/users-x?count"),
        atest::TestRequest::get().uri("/api/users-x/1"),
        atest::TestRequest::post()
            .uri("/api/users-x")
            .set_payload(r#"{"name": "Ada"}"#),
        atest::TestRequest::patch()
            .uri("/api/users-x/1")
            .set_payload(r#"{"name": "Ada"}"#),
        atest::TestRequest::delete().uri("/api/users-x/1"),
    ];
    for req in requests {
        let resp = atest::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let req = atest::TestRequest::get().uri("/api/users?count").to_request();
    assert_eq!(atest::call_service(&app, req).await.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[actix_rt::test]
async fn test_integrity_conflict() {
    let server = server();
    let app =
        atest::init_service(App::new().configure(configure(server.rest().state(), true))).await;

    let create = |email: &str| {
        atest::TestRequest::post()
            .uri("/api/users")
            .set_payload(json!({"name": "Ada", "email": email}).to_string())
            .to_request()
    };

    assert_eq!(
        atest::call_service(&app, create("ada@x.io")).await.status(),
        StatusCode::CREATED
    );
    assert_eq!(
        atest::call_service(&app, create("ada@x.io")).await.status(),
        StatusCode::CONFLICT
    );

    let orphan = atest::TestRequest::post()
        .uri("/api/users")
        .set_payload(r#"{"name": "Bob", "email": "bob@x.io", "team_id": "missing"}"#)
        .to_request();
    assert_eq!(
        atest::call_service(&app, orphan).await.status(),
        StatusCode::CONFLICT
    );
}

// ============================================================================
// Client against a live server
// ============================================================================

#[actix_rt::test]
async fn test_client_against_server() {
    let tablerest = server();
    let state = tablerest.rest().state();

    let http = HttpServer::new(move || App::new().configure(configure(state.clone(), true)))
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .unwrap();
    let port = http.addrs()[0].port();
    let running = http.run();
    let handle = running.handle();
    actix_rt::spawn(running);

    let client = Client::new(&ClientConfig {
        base_url: format!("http://127.0.0.1:{port}"),
        prefix: "/api".to_string(),
        timeout_secs: 5,
    })
    .unwrap();

    let team = client.from("teams").create(&json!({"title": "Core"})).await;
    assert_eq!(team.status, 201);
    let team_id = team.data.unwrap()["id"].as_str().unwrap().to_string();

    for (name, age) in [("Ada", 36), ("Grace", 45), ("Linus", 21)] {
        let created = client
            .from("users")
            .create(&json!({
                "name": name,
                "email": format!("{}@x.io", name.to_lowercase()),
                "age": age,
                "team_id": team_id,
            }))
            .await;
        assert!(created.is_ok(), "{:?}", created.error);
    }

    let adults = client
        .from("users")
        .select(["name", "age"])
        .gte("age", 30)
        .order("age", tablerest::sdk::Direction::Desc)
        .with_count()
        .get()
        .await;
    assert_eq!(adults.status, 200);
    assert_eq!(adults.count, Some(2));
    assert_eq!(
        adults.data,
        Some(json!([{"name": "Grace", "age": 45}, {"name": "Ada", "age": 36}]))
    );

    let linus = client
        .from("users")
        .eq("name", "Linus")
        .with(["team"])
        .single()
        .await;
    assert_eq!(linus.data.as_ref().unwrap()["team"]["title"], "Core");
    let linus_id = linus.data.unwrap()["id"].as_str().unwrap().to_string();

    let none = client.from("users").eq("name", "Nobody").maybe_single().await;
    assert!(none.is_ok());
    assert_eq!(none.data, None);

    let many = client.from("users").single().await;
    assert_eq!(many.error.as_deref(), Some("Single record expected, got 3"));

    let updated = client
        .from("users")
        .update(&linus_id, &json!({"age": 22}))
        .await;
    assert_eq!(updated.data.unwrap()["age"], 22);

    let deleted = client.from("users").delete(&linus_id).await;
    assert_eq!(deleted.status, 204);
    assert_eq!(deleted.data, None);
    assert!(deleted.is_ok());

    let missing = client.from("users").find(&linus_id).await;
    assert_eq!(missing.status, 404);
    assert!(missing.error.is_some());

    let unknown = client.from("orders").get().await;
    assert_eq!(unknown.status, 404);

    handle.stop(true).await;
}
