//! OpenAPI document generated from registered models

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use tablerest_common::types::{ColumnInfo, TableInfo};
use tablerest_query::grammar::{self, Operator};

use crate::resource::Registry;

#[derive(Debug, Clone, Serialize)]
pub struct OpenApiSchema {
    pub openapi: String,
    pub info: OpenApiInfo,
    pub paths: BTreeMap<String, OpenApiPath>,
    pub components: OpenApiComponents,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenApiInfo {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OpenApiPath {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<OpenApiOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<OpenApiOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<OpenApiOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<OpenApiOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<OpenApiOperation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenApiOperation {
    pub summary: String,
    pub tags: Vec<String>,
    pub parameters: Vec<OpenApiParameter>,
    pub responses: BTreeMap<String, OpenApiResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenApiParameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schema: JsonValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenApiResponse {
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenApiComponents {
    pub schemas: BTreeMap<String, JsonValue>,
}

/// Build the document for every model in `registry`, paths under `prefix`
pub fn generate(registry: &Registry, prefix: &str) -> OpenApiSchema {
    let prefix = prefix.trim_end_matches('/');
    let mut paths = BTreeMap::new();
    let mut schemas = BTreeMap::new();

    for model in registry.models() {
        let slug = model.slug().to_string();
        let table = model.describe();
        schemas.insert(slug.clone(), table_to_json_schema(&table));

        paths.insert(
            format!("{prefix}/{slug}"),
            OpenApiPath {
                get: Some(operation(
                    format!("List {slug}"),
                    &slug,
                    list_parameters(&table),
                    &[("200", "OK"), ("400", "Bad Request")],
                )),
                post: Some(operation(
                    format!("Create a {slug} record"),
                    &slug,
                    vec![],
                    &[("201", "Created"), ("400", "Bad Request"), ("409", "Conflict")],
                )),
                ..OpenApiPath::default()
            },
        );

        let id = || vec![parameter("id", "path", true, "string", None)];
        paths.insert(
            format!("{prefix}/{slug}/{{id}}"),
            OpenApiPath {
                get: Some(operation(
                    format!("Show a {slug} record"),
                    &slug,
                    id(),
                    &[("200", "OK"), ("404", "Not Found")],
                )),
                put: Some(operation(
                    format!("Replace fields of a {slug} record"),
                    &slug,
                    id(),
                    &[("200", "OK"), ("404", "Not Found"), ("409", "Conflict")],
                )),
                patch: Some(operation(
                    format!("Update a {slug} record"),
                    &slug,
                    id(),
                    &[("200", "OK"), ("404", "Not Found"), ("409", "Conflict")],
                )),
                delete: Some(operation(
                    format!("Delete a {slug} record"),
                    &slug,
                    id(),
                    &[("204", "No Content"), ("404", "Not Found")],
                )),
                ..OpenApiPath::default()
            },
        );
    }

    OpenApiSchema {
        openapi: "3.0.3".to_string(),
        info: OpenApiInfo {
            title: "tablerest API".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: Some("REST API generated from registered resources".to_string()),
        },
        paths,
        components: OpenApiComponents { schemas },
    }
}

fn operation(
    summary: String,
    tag: &str,
    parameters: Vec<OpenApiParameter>,
    responses: &[(&str, &str)],
) -> OpenApiOperation {
    OpenApiOperation {
        summary,
        tags: vec![tag.to_string()],
        parameters,
        responses: responses
            .iter()
            .map(|(status, description)| {
                (
                    (*status).to_string(),
                    OpenApiResponse {
                        description: (*description).to_string(),
                    },
                )
            })
            .collect(),
    }
}

fn parameter(
    name: &str,
    location: &str,
    required: bool,
    json_type: &str,
    description: Option<&str>,
) -> OpenApiParameter {
    OpenApiParameter {
        name: name.to_string(),
        location: location.to_string(),
        required,
        description: description.map(ToString::to_string),
        schema: json!({ "type": json_type }),
    }
}

fn list_parameters(table: &TableInfo) -> Vec<OpenApiParameter> {
    let mut parameters = vec![
        parameter(grammar::SELECT, "query", false, "string", Some("Comma-separated columns")),
        parameter(
            grammar::WITH,
            "query",
            false,
            "string",
            Some("Comma-separated relations to eager-load"),
        ),
        parameter(
            grammar::ORDER,
            "query",
            false,
            "string",
            Some("column.asc or column.desc, comma-separated"),
        ),
        parameter(grammar::LIMIT, "query", false, "integer", None),
        parameter(grammar::OFFSET, "query", false, "integer", None),
        parameter(grammar::COUNT, "query", false, "boolean", Some("Include the total match count")),
        parameter(grammar::AND, "query", false, "string", Some("(column.op.value,...)")),
        parameter(grammar::OR, "query", false, "string", Some("(column.op.value,...)")),
        parameter(grammar::JOIN, "query", false, "string", Some("table:left_key=right_key")),
        parameter(grammar::LEFT_JOIN, "query", false, "string", Some("table:left_key=right_key")),
        parameter(grammar::RIGHT_JOIN, "query", false, "string", Some("table:left_key=right_key")),
    ];

    let operators = Operator::ALL
        .iter()
        .map(|op| op.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    for column in &table.columns {
        let description = format!("Filter on {} ({operators})", column.name);
        parameters.push(parameter(
            &format!("{}.{{operator}}", column.name),
            "query",
            false,
            "string",
            Some(&description),
        ));
    }

    parameters
}

/// Convert table to JSON schema
fn table_to_json_schema(table: &TableInfo) -> JsonValue {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for column in &table.columns {
        properties.insert(column.name.clone(), column_to_json_schema(column));

        if !column.is_nullable && column.name != table.primary_key {
            required.push(JsonValue::String(column.name.clone()));
        }
    }

    for relation in &table.relations {
        let item = json!({ "$ref": format!("#/components/schemas/{}", relation.table) });
        let schema = if relation.many {
            json!({ "type": "array", "items": item })
        } else {
            item
        };
        properties.insert(relation.name.clone(), schema);
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Convert column to JSON schema
fn column_to_json_schema(column: &ColumnInfo) -> JsonValue {
    let json_type = match column.data_type.as_str() {
        "integer" | "bigint" | "smallint" | "int4" | "int8" | "int2" => "integer",
        "real" | "double precision" | "float4" | "float8" | "numeric" | "decimal" => "number",
        "boolean" | "bool" => "boolean",
        "json" | "jsonb" => "object",
        _ => "string",
    };

    let mut schema = json!({
        "type": json_type,
    });

    if let Some(desc) = &column.description {
        schema["description"] = JsonValue::String(desc.clone());
    }

    if column.data_type == "uuid" {
        schema["format"] = JsonValue::String("uuid".to_string());
    } else if column.data_type.contains("timestamp") {
        schema["format"] = JsonValue::String("date-time".to_string());
    } else if column.data_type == "date" {
        schema["format"] = JsonValue::String("date".to_string());
    }

    if column.is_nullable {
        schema["nullable"] = JsonValue::Bool(true);
    }

    schema
}
