//! tablerest Common Types and Utilities
//!
//! Shared configuration, error taxonomy, response envelope and schema
//! description types used by the server and the SDK.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod types;

pub use config::TableRestConfig;
pub use error::{Error, ErrorClass, Result};
pub use types::ResultEnvelope;
