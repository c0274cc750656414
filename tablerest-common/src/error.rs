//! Error types for the tablerest layer

use thiserror::Error;

/// Errors raised while exposing resources over REST
#[derive(Error, Debug)]
pub enum Error {
    // Client Input Errors
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid query parameter: {0}")]
    InvalidQueryParam(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Malformed JSON body: {0}")]
    MalformedBody(String),

    #[error("Empty request body")]
    EmptyBody,

    // Lookup Errors
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    // Store Errors
    #[error("Unknown column: {0}")]
    ColumnNotFound(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // General Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for tablerest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used at the response boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    ClientInput,
    NotFound,
    IntegrityConflict,
    UnknownColumn,
    /// No response was received; only the client produces this class
    Transport,
    Internal,
}

impl ErrorClass {
    /// HTTP status reported for the class, `0` when nothing came back
    pub fn status_code(self) -> u16 {
        match self {
            Self::ClientInput | Self::UnknownColumn => 400,
            Self::NotFound => 404,
            Self::IntegrityConflict => 409,
            Self::Transport => 0,
            Self::Internal => 500,
        }
    }
}

impl Error {
    /// Taxonomy bucket for this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidIdentifier(_)
            | Self::InvalidQueryParam(_)
            | Self::InvalidFilter(_)
            | Self::MalformedBody(_)
            | Self::EmptyBody => ErrorClass::ClientInput,

            Self::ResourceNotFound(_) | Self::RecordNotFound(_) => ErrorClass::NotFound,

            Self::DuplicateKey(_) | Self::ForeignKeyViolation(_) => {
                ErrorClass::IntegrityConflict
            }

            Self::ColumnNotFound(_) => ErrorClass::UnknownColumn,

            Self::DatabaseError(_)
            | Self::ConfigError(_)
            | Self::IoError(_) => ErrorClass::Internal,
        }
    }

    /// HTTP status code for each error type
    pub fn status_code(&self) -> u16 {
        self.class().status_code()
    }

    /// Stable error code for logs and API consumers
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::InvalidQueryParam(_) => "invalid_param",
            Self::InvalidFilter(_) => "invalid_filter",
            Self::MalformedBody(_) => "malformed_body",
            Self::EmptyBody => "empty_body",
            Self::ResourceNotFound(_) => "resource_not_found",
            Self::RecordNotFound(_) => "not_found",
            Self::ColumnNotFound(_) => "unknown_column",
            Self::DuplicateKey(_) => "duplicate_key",
            Self::ForeignKeyViolation(_) => "fk_violation",
            Self::DatabaseError(_) => "database_error",
            Self::ConfigError(_) => "config_error",
            Self::IoError(_) => "io_error",
        }
    }

    /// Message safe to hand to API consumers.
    ///
    /// Internal errors collapse to a generic message unless `debug` is set.
    pub fn public_message(&self, debug: bool) -> String {
        if self.class() == ErrorClass::Internal && !debug {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}
