//! tablerest
//!
//! Convention-based REST exposure layer: HTTP query strings are parsed into a
//! normalized query description and replayed onto a query builder.
//!
//! # Crates
//!
//! - [`query`] - grammar, parser, filter applier, SQL rendering
//! - [`rest`] - actix-web handlers, resource registry, stores, OpenAPI
//! - [`sdk`] - fluent client writing the same grammar
//! - [`common`] - configuration, errors, the response envelope

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub use tablerest_common as common;
pub use tablerest_query as query;
pub use tablerest_rest as rest;
pub use tablerest_sdk as sdk;

use std::sync::Arc;
use tracing::info;

use tablerest_common::config::TableRestConfig;
use tablerest_common::error::Result;
use tablerest_rest::{InMemoryStore, Registry, RestServer, Store};

/// Main tablerest server
pub struct TableRest {
    config: TableRestConfig,
    registry: Arc<Registry>,
    rest_server: RestServer,
}

impl TableRest {
    /// Create a server over the configured resources, backed by an
    /// in-memory store
    ///
    /// # Errors
    /// Returns an error if a resource definition is invalid.
    pub fn new(config: TableRestConfig) -> Result<Self> {
        let registry = Arc::new(Registry::from_config(&config.resources)?);
        let store = Arc::new(InMemoryStore::from_registry(&registry));
        Ok(Self::assemble(config, registry, store))
    }

    /// Create a server over the configured resources and an external store
    ///
    /// # Errors
    /// Returns an error if a resource definition is invalid.
    pub fn with_store(config: TableRestConfig, store: Arc<dyn Store>) -> Result<Self> {
        let registry = Arc::new(Registry::from_config(&config.resources)?);
        Ok(Self::assemble(config, registry, store))
    }

    fn assemble(config: TableRestConfig, registry: Arc<Registry>, store: Arc<dyn Store>) -> Self {
        info!(
            "Initializing tablerest with {} resource(s)",
            registry.len()
        );
        let rest_server = RestServer::new(&config.rest, registry.clone(), store);
        Self {
            config,
            registry,
            rest_server,
        }
    }

    /// Get reference to the REST server
    #[must_use]
    pub fn rest(&self) -> &RestServer {
        &self.rest_server
    }

    /// Get the resource registry
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &TableRestConfig {
        &self.config
    }

    /// Client pointed at the configured server
    ///
    /// # Errors
    /// Returns an error if the client base URL is invalid.
    pub fn client(&self) -> std::result::Result<tablerest_sdk::Client, tablerest_sdk::ClientError> {
        tablerest_sdk::Client::new(&self.config.client)
    }

    /// Serve until the HTTP server stops
    ///
    /// # Errors
    /// Returns an error if the REST server fails to start.
    pub async fn run(&self) -> Result<()> {
        info!(
            "  - REST service: http://{}:{}{}",
            self.config.rest.host, self.config.rest.port, self.config.rest.prefix
        );
        self.rest_server.run().await
    }

    /// Stop the REST server, letting in-flight requests finish
    pub async fn shutdown(&self) {
        info!("Shutting down tablerest");
        self.rest_server.shutdown().await;
    }
}
