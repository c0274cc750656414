//! Common types shared by the server and the SDK

use serde::{Deserialize, Serialize};

use crate::error::ErrorClass;

// ============================================================================
// Response Types
// ============================================================================

/// Uniform response envelope.
///
/// `data`, `count` and `error` travel as the JSON body. `status` is the
/// transport-level HTTP status and is carried out of band; `0` means no
/// response was ever received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope<T = serde_json::Value> {
    pub data: Option<T>,
    pub count: Option<u64>,
    pub error: Option<String>,
    #[serde(skip)]
    pub status: u16,
}

impl<T> ResultEnvelope<T> {
    /// Successful envelope carrying `data`
    pub fn ok(data: T, status: u16) -> Self {
        Self {
            data: Some(data),
            count: None,
            error: None,
            status,
        }
    }

    /// Successful envelope without a payload (e.g. `204 No Content`)
    pub fn empty(status: u16) -> Self {
        Self {
            data: None,
            count: None,
            error: None,
            status,
        }
    }

    /// Failed envelope
    pub fn failure(error: impl Into<String>, status: u16) -> Self {
        Self {
            data: None,
            count: None,
            error: Some(error.into()),
            status,
        }
    }

    /// Failure before any response was received
    pub fn transport_failure(error: impl Into<String>) -> Self {
        Self::failure(error, ErrorClass::Transport.status_code())
    }

    /// Attach a row count
    #[must_use]
    pub fn with_count(mut self, count: Option<u64>) -> Self {
        self.count = count;
        self
    }

    /// Whether the envelope carries no error
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

// ============================================================================
// Schema Description Types
// ============================================================================

/// Table metadata described by a resource model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub primary_key: String,
    pub columns: Vec<ColumnInfo>,
    pub relations: Vec<RelationInfo>,
}

impl TableInfo {
    /// Column lookup by name
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Relation lookup by `with` name
    pub fn relation(&self, name: &str) -> Option<&RelationInfo> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// Column metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub is_unique: bool,
    pub description: Option<String>,
}

/// Relation metadata used for eager loading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationInfo {
    pub name: String,
    pub table: String,
    pub local_key: String,
    pub foreign_key: String,
    pub many: bool,
}
