//! Client construction errors
//!
//! Request failures never surface here; they come back as envelopes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Base URL cannot carry a path: {0}")]
    CannotBeABase(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
