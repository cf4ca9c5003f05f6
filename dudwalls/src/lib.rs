//! Rust SDK for the Dudwalls JSON document database.
//!
//! This crate is the entry point of the SDK. It re-exports the query engine and
//! client façade from `dudwalls-core` together with the available backends.
//!
//! # Features
//!
//! - **MongoDB-style API** - databases, collections, `find`, `insert_many`,
//!   `update_many`, `count_documents`, `distinct` and `aggregate`
//! - **Client-side query engine** - filters with `$eq`/`$gt`/`$in`/`$regex`/...,
//!   multi-key sorting, skip/limit, projections and aggregation pipelines
//! - **Pluggable backends** - the REST backend (`http` feature, on by default)
//!   and an in-memory backend for tests and offline work
//! - **Typed collections** - map documents onto your own Serde structs
//!
//! # Quick Start
//!
//! ```ignore
//! use dudwalls::{prelude::*, http::HttpStoreBuilder};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let client = DudwallsClient::new(
//!         HttpStoreBuilder::new("https://dudwalls.example.com", "api-key").build().await?,
//!     );
//!
//!     let users = client.database("app").collection("users");
//!     users.insert_one(document(json!({ "name": "Ann", "age": 31 }))?).await?;
//!
//!     let adults = users
//!         .find_json(&json!({ "where": { "age": { "$gte": 18 } }, "orderBy": { "age": "desc" } }))
//!         .await?;
//!     println!("{adults:?}");
//!
//!     client.shutdown().await
//! }
//! ```
//!
//! # Offline queries
//!
//! The engine does not need a server. Any slice of documents can be queried
//! directly:
//!
//! ```ignore
//! use dudwalls::engine::QueryEngine;
//!
//! let page = QueryEngine::new().find_json(&documents, &json!({ "skip": 20, "limit": 10 }))?;
//! ```
//!
//! # Dynamic Dispatch
//!
//! [`DudwallsClient::into_dyn`] erases the backend type so the backend can be
//! picked at runtime:
//!
//! ```ignore
//! let client: DudwallsClient<Box<dyn DynStoreBackend>> = if offline {
//!     DudwallsClient::new(InMemoryStore::new()).into_dyn()
//! } else {
//!     DudwallsClient::new(HttpStoreBuilder::from_env()?.build().await?).into_dyn()
//! };
//! ```
//!
//! # Backends
//!
//! - [`memory`] - in-process storage for development and testing
//! - `http` - the Dudwalls REST API (requires the `http` feature)

pub mod prelude;

pub use dudwalls_core::{aggregate, backend, client, collection, document, engine, error, page, path, query, value};

pub use dudwalls_core::{
    client::{Database, DudwallsClient},
    collection::{Collection, TypedCollection},
    document::{Document, Entity},
    engine::QueryEngine,
    error::{DocumentStoreError, DocumentStoreResult},
};

pub use serde_json;

/// The in-memory backend.
pub mod memory {
    pub use dudwalls_memory::*;
}

/// The REST backend.
#[cfg(feature = "http")]
pub mod http {
    pub use dudwalls_http::*;
}

/// Converts a JSON object literal into a [`Document`].
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] if `value` is not an object.
pub fn document(value: serde_json::Value) -> DocumentStoreResult<Document> {
    dudwalls_core::document::document_from_value(value)
}
