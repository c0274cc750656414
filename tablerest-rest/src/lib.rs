//! tablerest REST exposure layer
//!
//! Serves registered resources under a path prefix:
//! - `GET {prefix}/{slug}` lists rows, filtered by the query-string grammar
//! - `GET|PUT|PATCH|DELETE {prefix}/{slug}/{id}` for single records
//! - `POST {prefix}/{slug}` creates a record from mass-assignable fields
//! - `GET {prefix}/openapi.json` describes every resource
//!
//! Responses use the `{ data, count, error }` envelope.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod handlers;
pub mod openapi;
pub mod resource;
pub mod server;
pub mod store;

pub use handlers::RestState;
pub use resource::{Model, Registry, ResourceDef};
pub use server::{configure, RestServer};
pub use store::{InMemoryStore, Store};
