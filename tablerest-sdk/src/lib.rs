//! tablerest Rust SDK
//!
//! Fluent client that writes the tablerest query-string grammar:
//!
//! ```no_run
//! # async fn run() -> Result<(), tablerest_sdk::ClientError> {
//! use tablerest_sdk::{Client, Direction};
//!
//! let client = Client::connect("http://localhost:3000")?;
//! let adults = client
//!     .from("users")
//!     .select(["id", "name"])
//!     .gte("age", 18)
//!     .order("name", Direction::Desc)
//!     .page(2, 20)
//!     .count()
//!     .get()
//!     .await;
//!
//! if let Some(error) = adults.error {
//!     eprintln!("request failed ({}): {error}", adults.status);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod builder;
pub mod client;
pub mod error;
pub mod response;

pub use builder::QueryBuilder;
pub use client::Client;
pub use error::{ClientError, Result};

pub use tablerest_common::types::ResultEnvelope;
pub use tablerest_query::description::FilterClause;
pub use tablerest_query::grammar::{Direction, Operator};
