//! Resource models and the registry that exposes them

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use tablerest_common::config::ResourceConfig;
use tablerest_common::error::{Error, Result};
use tablerest_common::types::{ColumnInfo, RelationInfo, TableInfo};
use tablerest_query::grammar::{is_valid_identifier, validate_identifier};

/// A resource exposed over REST.
///
/// Every model describes its own schema; nothing is discovered at runtime.
pub trait Model: Send + Sync {
    /// URL path segment
    fn slug(&self) -> &str;

    /// Backing table
    fn table(&self) -> &str;

    fn primary_key(&self) -> &str;

    /// Mass-assignable columns; empty allows every column
    fn fillable(&self) -> &[String];

    /// Schema description used by the store and the OpenAPI document
    fn describe(&self) -> TableInfo;

    /// Keep only mass-assignable fields of a request body
    fn fill(&self, body: Map<String, JsonValue>) -> Map<String, JsonValue> {
        let fillable = self.fillable();
        if fillable.is_empty() {
            return body;
        }
        body.into_iter()
            .filter(|(key, _)| fillable.iter().any(|f| f == key))
            .collect()
    }
}

/// Config-driven model definition
#[derive(Debug, Clone)]
pub struct ResourceDef {
    slug: String,
    table: String,
    primary_key: String,
    fillable: Vec<String>,
    columns: Vec<ColumnInfo>,
    relations: Vec<RelationInfo>,
}

impl ResourceDef {
    /// Create a resource whose table shares the slug
    pub fn new(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            table: slug.to_string(),
            primary_key: "id".to_string(),
            fillable: Vec::new(),
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Configure the backing table
    #[must_use]
    pub fn with_table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    /// Configure the primary key
    #[must_use]
    pub fn with_primary_key(mut self, primary_key: &str) -> Self {
        self.primary_key = primary_key.to_string();
        self
    }

    /// Configure mass-assignable columns
    #[must_use]
    pub fn with_fillable(mut self, fillable: &[&str]) -> Self {
        self.fillable = fillable.iter().map(ToString::to_string).collect();
        self
    }

    /// Add a column
    #[must_use]
    pub fn with_column(mut self, name: &str, data_type: &str, nullable: bool) -> Self {
        self.columns.push(ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_nullable: nullable,
            is_unique: false,
            description: None,
        });
        self
    }

    /// Add a unique column
    #[must_use]
    pub fn with_unique_column(mut self, name: &str, data_type: &str) -> Self {
        self.columns.push(ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_nullable: false,
            is_unique: true,
            description: None,
        });
        self
    }

    /// Add a relation available to `with`
    #[must_use]
    pub fn with_relation(
        mut self,
        name: &str,
        table: &str,
        local_key: &str,
        foreign_key: &str,
        many: bool,
    ) -> Self {
        self.relations.push(RelationInfo {
            name: name.to_string(),
            table: table.to_string(),
            local_key: local_key.to_string(),
            foreign_key: foreign_key.to_string(),
            many,
        });
        self
    }

    /// Build from configuration, validating every identifier
    pub fn from_config(config: &ResourceConfig) -> Result<Self> {
        let table = config.table.clone().unwrap_or_else(|| config.slug.clone());

        let identifiers = [config.slug.as_str(), table.as_str(), config.primary_key.as_str()]
            .into_iter()
            .chain(config.fillable.iter().map(String::as_str))
            .chain(config.columns.iter().map(|c| c.name.as_str()))
            .chain(config.relations.iter().flat_map(|r| {
                [
                    r.name.as_str(),
                    r.table.as_str(),
                    r.local_key.as_str(),
                    r.foreign_key.as_str(),
                ]
            }));
        for name in identifiers {
            if !is_valid_identifier(name) {
                return Err(Error::ConfigError(format!(
                    "resource '{}': invalid identifier '{}'",
                    config.slug, name
                )));
            }
        }

        Ok(Self {
            slug: config.slug.clone(),
            table,
            primary_key: config.primary_key.clone(),
            fillable: config.fillable.clone(),
            columns: config
                .columns
                .iter()
                .map(|c| ColumnInfo {
                    name: c.name.clone(),
                    data_type: c.data_type.clone(),
                    is_nullable: c.nullable,
                    is_unique: c.unique,
                    description: c.description.clone(),
                })
                .collect(),
            relations: config
                .relations
                .iter()
                .map(|r| RelationInfo {
                    name: r.name.clone(),
                    table: r.table.clone(),
                    local_key: r.local_key.clone(),
                    foreign_key: r.foreign_key.clone(),
                    many: r.many,
                })
                .collect(),
        })
    }
}

impl Model for ResourceDef {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn primary_key(&self) -> &str {
        &self.primary_key
    }

    fn fillable(&self) -> &[String] {
        &self.fillable
    }

    fn describe(&self) -> TableInfo {
        TableInfo {
            name: self.table.clone(),
            primary_key: self.primary_key.clone(),
            columns: self.columns.clone(),
            relations: self.relations.clone(),
        }
    }
}

/// Slug → model map, built once at startup and shared read-only
#[derive(Default)]
pub struct Registry {
    resources: BTreeMap<String, Arc<dyn Model>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configured resources
    pub fn from_config(resources: &[ResourceConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for config in resources {
            registry.register(Arc::new(ResourceDef::from_config(config)?))?;
        }
        Ok(registry)
    }

    /// Register a model under its slug
    pub fn register(&mut self, model: Arc<dyn Model>) -> Result<()> {
        let slug = validate_identifier(model.slug())
            .map_err(|e| Error::ConfigError(e.to_string()))?
            .to_string();
        if self.resources.contains_key(&slug) {
            return Err(Error::ConfigError(format!(
                "resource '{slug}' registered twice"
            )));
        }
        self.resources.insert(slug, model);
        Ok(())
    }

    /// Builder-style registration
    pub fn with(mut self, model: impl Model + 'static) -> Result<Self> {
        self.register(Arc::new(model))?;
        Ok(self)
    }

    /// Resolve a slug from the URL path.
    ///
    /// Non-conforming identifiers are rejected before any lookup.
    pub fn get(&self, slug: &str) -> Result<Arc<dyn Model>> {
        validate_identifier(slug)?;
        self.resources
            .get(slug)
            .cloned()
            .ok_or_else(|| Error::ResourceNotFound(slug.to_string()))
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<dyn Model>> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tablerest_common::config::ColumnConfig;

    fn users() -> ResourceDef {
        ResourceDef::new("users")
            .with_column("id", "uuid", false)
            .with_column("name", "text", true)
            .with_fillable(&["name"])
    }

    #[test]
    fn test_registry_lookup() {
        let registry = Registry::new().with(users()).unwrap();
        assert_eq!(registry.get("users").unwrap().table(), "users");
        assert!(matches!(
            registry.get("orders"),
            Err(Error::ResourceNotFound(_))
        ));
        assert!(matches!(
            registry.get("users;drop"),
            Err(Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_duplicate_registration() {
        let result = Registry::new().with(users()).unwrap().with(users());
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_fill_filters_body() {
        let body = json!({"name": "Ada", "is_admin": true});
        let filled = users().fill(body.as_object().cloned().unwrap());
        assert_eq!(JsonValue::Object(filled), json!({"name": "Ada"}));

        let open = ResourceDef::new("notes");
        let filled = open.fill(body.as_object().cloned().unwrap());
        assert_eq!(filled.len(), 2);
    }

    #[test]
    fn test_from_config_rejects_bad_identifiers() {
        let config = ResourceConfig {
            slug: "users".to_string(),
            table: Some("app users".to_string()),
            primary_key: "id".to_string(),
            fillable: vec![],
            columns: vec![],
            relations: vec![],
        };
        assert!(matches!(
            ResourceDef::from_config(&config),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_from_config_describes_columns() {
        let config = ResourceConfig {
            slug: "people".to_string(),
            table: Some("users".to_string()),
            primary_key: "uid".to_string(),
            fillable: vec!["email".to_string()],
            columns: vec![ColumnConfig {
                name: "email".to_string(),
                data_type: "text".to_string(),
                nullable: false,
                unique: true,
                description: Some("Login".to_string()),
            }],
            relations: vec![],
        };
        let def = ResourceDef::from_config(&config).unwrap();
        let info = def.describe();
        assert_eq!(def.slug(), "people");
        assert_eq!(info.name, "users");
        assert_eq!(info.primary_key, "uid");
        assert!(info.column("email").unwrap().is_unique);
    }
}
