//! REST API server implementation

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::dev::ServerHandle;
use actix_web::{middleware, web, App, HttpServer};
use parking_lot::Mutex;
use tracing::info;

use tablerest_common::config::RestConfig;
use tablerest_common::error::Result;

use crate::handlers::{self, RestState};
use crate::resource::Registry;
use crate::store::{InMemoryStore, Store};

/// Register every route on an actix service config.
///
/// Shared by [`RestServer::run`] and `actix_web::test::init_service`.
pub fn configure(
    state: Arc<RestState>,
    openapi_enabled: bool,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        let prefix = state.prefix.trim_end_matches('/').to_string();

        let mut scope = web::scope(&prefix);
        if openapi_enabled {
            scope = scope.route("/openapi.json", web::get().to(handlers::openapi_handler));
        }
        scope = scope
            .route("/{slug}", web::get().to(handlers::list_handler))
            .route("/{slug}", web::post().to(handlers::create_handler))
            .route("/{slug}/{id}", web::get().to(handlers::show_handler))
            .route("/{slug}/{id}", web::put().to(handlers::update_handler))
            .route("/{slug}/{id}", web::patch().to(handlers::update_handler))
            .route("/{slug}/{id}", web::delete().to(handlers::delete_handler));

        cfg.app_data(web::Data::new(state))
            .route("/health", web::get().to(handlers::health_handler))
            .service(scope);
    }
}

/// Build the CORS middleware from configured origins
fn cors(origins: &[String]) -> Cors {
    if origins.iter().any(|o| o == "*") {
        return Cors::permissive();
    }
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
}

/// REST API server over the registered resources
pub struct RestServer {
    config: RestConfig,
    state: Arc<RestState>,
    handle: Mutex<Option<ServerHandle>>,
}

impl RestServer {
    /// Create a server over an explicit registry and store
    pub fn new(config: &RestConfig, registry: Arc<Registry>, store: Arc<dyn Store>) -> Self {
        let state = Arc::new(RestState::new(config, registry, store));
        Self {
            config: config.clone(),
            state,
            handle: Mutex::new(None),
        }
    }

    /// Create a server backed by an empty in-memory store
    pub fn in_memory(config: &RestConfig, registry: Arc<Registry>) -> Self {
        let store = Arc::new(InMemoryStore::from_registry(&registry));
        Self::new(config, registry, store)
    }

    /// Shared handler state
    #[must_use]
    pub fn state(&self) -> Arc<RestState> {
        self.state.clone()
    }

    /// Whether [`run`](Self::run) is currently serving
    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Run the REST server until [`shutdown`](Self::shutdown) stops it
    pub async fn run(&self) -> Result<()> {
        let state = self.state.clone();
        let openapi_enabled = self.config.openapi_enabled;
        let origins = self.config.cors_origins.clone();
        let host = self.config.host.clone();
        let port = self.config.port;

        info!("Starting REST API server on {}:{}", host, port);
        info!(
            "  Resources: {} under {}",
            state.registry.len(),
            self.config.prefix
        );

        let server = HttpServer::new(move || {
            App::new()
                .wrap(cors(&origins))
                .wrap(middleware::Compress::default())
                .wrap(middleware::Logger::default())
                .configure(configure(state.clone(), openapi_enabled))
        })
        .workers(4)
        .disable_signals()
        .bind(format!("{}:{}", host, port))?
        .run();

        *self.handle.lock() = Some(server.handle());
        let result = server.await;
        self.handle.lock().take();

        result?;
        Ok(())
    }

    /// Stop accepting connections and let in-flight requests finish
    pub async fn shutdown(&self) {
        let handle = self.handle.lock().take();
        match handle {
            Some(handle) => {
                info!("Stopping REST API server");
                handle.stop(true).await;
            }
            None => info!("REST API server is not running"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceDef;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{json, Value as JsonValue};
    use std::time::Duration;

    fn app_state(config: &RestConfig) -> Arc<RestState> {
        let registry = Arc::new(
            Registry::new()
                .with(
                    ResourceDef::new("users")
                        .with_column("id", "integer", false)
                        .with_column("name", "text", false)
                        .with_column("role", "text", true)
                        .with_fillable(&["name", "role"]),
                )
                .unwrap(),
        );
        let store = InMemoryStore::from_registry(&registry)
            .with_rows(
                "users",
                vec![
                    json!({"id": 1, "name": "Ada", "role": "admin"}),
                    json!({"id": 2, "name": "Linus", "role": "user"}),
                    json!({"id": 3, "name": "Grace", "role": "user"}),
                ],
            )
            .unwrap();
        RestServer::new(config, registry, Arc::new(store)).state()
    }

    #[actix_rt::test]
    async fn test_list_with_count() {
        let config = RestConfig::default();
        let app =
            test::init_service(App::new().configure(configure(app_state(&config), true))).await;

        let req = test::TestRequest::get()
            .uri("/api/users?role=user&order=name.desc&limit=1&count")
            .to_request();
        let body: JsonValue = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["data"], json!([{"id": 2, "name": "Linus", "role": "user"}]));
        assert_eq!(body["count"], 2);
        assert_eq!(body["error"], JsonValue::Null);
    }

    #[actix_rt::test]
    async fn test_max_rows_caps_limit() {
        let config = RestConfig {
            max_rows: 2,
            ..RestConfig::default()
        };
        let app =
            test::init_service(App::new().configure(configure(app_state(&config), true))).await;

        for uri in ["/api/users", "/api/users?limit=50"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let body: JsonValue = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["data"].as_array().unwrap().len(), 2);
        }
    }

    #[actix_rt::test]
    async fn test_crud_round() {
        let config = RestConfig::default();
        let app =
            test::init_service(App::new().configure(configure(app_state(&config), true))).await;

        let req = test::TestRequest::post()
            .uri("/api/users")
            .set_payload(r#"{"name": "Barbara", "is_admin": true}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: JsonValue = test::read_body_json(resp).await;
        assert_eq!(created["data"]["name"], "Barbara");
        assert!(created["data"].get("is_admin").is_none());

        let req = test::TestRequest::patch()
            .uri("/api/users/2")
            .set_payload(r#"{"role": "admin", "id": 99}"#)
            .to_request();
        let updated: JsonValue = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated["data"]["id"], 2);
        assert_eq!(updated["data"]["role"], "admin");

        let req = test::TestRequest::delete().uri("/api/users/2").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get().uri("/api/users/2").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_rejections() {
        let config = RestConfig::default();
        let app =
            test::init_service(App::new().configure(configure(app_state(&config), true))).await;

        let cases = [
            (test::TestRequest::get().uri("/api/orders"), StatusCode::NOT_FOUND),
            (test::TestRequest::get().uri("/api/us-ers"), StatusCode::BAD_REQUEST),
            (
                test::TestRequest::get().uri("/api/users?shoe=42"),
                StatusCode::BAD_REQUEST,
            ),
            (
                test::TestRequest::post().uri("/api/users").set_payload("{nope"),
                StatusCode::BAD_REQUEST,
            ),
            (
                test::TestRequest::post().uri("/api/users").set_payload(""),
                StatusCode::BAD_REQUEST,
            ),
            (
                test::TestRequest::post()
                    .uri("/api/users")
                    .set_payload(r#"{"is_admin": true}"#),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (req, status) in cases {
            let resp = test::call_service(&app, req.to_request()).await;
            assert_eq!(resp.status(), status);
        }
    }

    #[actix_rt::test]
    async fn test_shutdown_stops_server() {
        let config = RestConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..RestConfig::default()
        };
        let server = Arc::new(RestServer::in_memory(&config, Arc::new(Registry::new())));
        assert!(!server.is_running());

        let running = actix_rt::spawn({
            let server = server.clone();
            async move { server.run().await }
        });
        while !server.is_running() {
            actix_rt::time::sleep(Duration::from_millis(10)).await;
        }

        server.shutdown().await;
        assert!(running.await.unwrap().is_ok());
        assert!(!server.is_running());
    }

    #[actix_rt::test]
    async fn test_openapi_and_health() {
        let config = RestConfig::default();
        let app =
            test::init_service(App::new().configure(configure(app_state(&config), true))).await;

        let req = test::TestRequest::get().uri("/api/openapi.json").to_request();
        let doc: JsonValue = test::call_and_read_body_json(&app, req).await;
        assert!(doc["paths"]["/api/users"].is_object());

        let req = test::TestRequest::get().uri("/health").to_request();
        let health: JsonValue = test::call_and_read_body_json(&app, req).await;
        assert_eq!(health["status"], "healthy");
    }
}
