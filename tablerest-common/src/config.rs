//! Configuration types for tablerest

use serde::{Deserialize, Serialize};

/// Main configuration, constructed once at startup and shared by reference
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableRestConfig {
    /// REST API configuration
    pub rest: RestConfig,
    /// Resources exposed under the REST prefix
    pub resources: Vec<ResourceConfig>,
    /// Client configuration used by the SDK
    pub client: ClientConfig,
}

/// REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    /// Host to bind to
    pub host: String,
    /// Port for REST API (default: 3000)
    pub port: u16,
    /// Path prefix for resource routes (default: "/api")
    pub prefix: String,
    /// Maximum rows per request, also the default page size
    pub max_rows: u64,
    /// Expose raw internal error messages in responses
    pub debug: bool,
    /// Serve the generated OpenAPI document
    pub openapi_enabled: bool,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Query grammar capabilities
    pub grammar: GrammarConfig,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            prefix: "/api".to_string(),
            max_rows: 1000,
            debug: false,
            openapi_enabled: true,
            cors_origins: vec!["*".to_string()],
            grammar: GrammarConfig::default(),
        }
    }
}

/// Optional grammar capabilities and parse strictness
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    /// Accept `and=(...)` / `or=(...)` groups
    pub groups: bool,
    /// Accept `join`, `leftJoin` and `rightJoin`
    pub joins: bool,
    /// Reject malformed fragments instead of dropping them
    pub strict: bool,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            groups: true,
            joins: true,
            strict: false,
        }
    }
}

/// A single exposed resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// URL path segment
    pub slug: String,
    /// Backing table, defaults to the slug
    #[serde(default)]
    pub table: Option<String>,
    /// Primary key column
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Mass-assignable columns (empty allows every column)
    #[serde(default)]
    pub fillable: Vec<String>,
    /// Column definitions
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    /// Relations available to `with`
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// Column definition for a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(default = "default_data_type")]
    pub data_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_data_type() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

/// Relation available for eager loading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationConfig {
    /// Name used in `with=`
    pub name: String,
    /// Related table
    pub table: String,
    /// Column on this resource
    pub local_key: String,
    /// Column on the related table
    pub foreign_key: String,
    /// Load a list (has-many) rather than a single row (belongs-to)
    #[serde(default)]
    pub many: bool,
}

/// SDK client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server base URL
    pub base_url: String,
    /// Path prefix, must match the server's `rest.prefix`
    pub prefix: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            prefix: "/api".to_string(),
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TableRestConfig::default();
        assert_eq!(config.rest.port, 3000);
        assert_eq!(config.rest.prefix, "/api");
        assert!(config.rest.grammar.groups);
        assert!(!config.rest.grammar.strict);
        assert!(!config.rest.debug);
        assert!(config.resources.is_empty());
    }

    #[test]
    fn test_config_from_toml() {
        let raw = r#"
            [rest]
            port = 8080
            debug = true

            [rest.grammar]
            strict = true

            [[resources]]
            slug = "users"
            fillable = ["name", "email"]

            [[resources.columns]]
            name = "id"
            data_type = "uuid"
            nullable = false

            [[resources.columns]]
            name = "email"
            unique = true
        "#;

        let config: TableRestConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.rest.port, 8080);
        assert_eq!(config.rest.host, "0.0.0.0");
        assert!(config.rest.debug);
        assert!(config.rest.grammar.strict);
        assert!(config.rest.grammar.joins);

        let users = &config.resources[0];
        assert_eq!(users.primary_key, "id");
        assert_eq!(users.table, None);
        assert_eq!(users.columns.len(), 2);
        assert_eq!(users.columns[1].data_type, "text");
        assert!(users.columns[1].unique);
        assert!(users.columns[1].nullable);
    }

    #[test]
    fn test_config_serialization() {
        let config = TableRestConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: TableRestConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.rest.port, parsed.rest.port);
        assert_eq!(config.client.timeout_secs, parsed.client.timeout_secs);
    }
}
