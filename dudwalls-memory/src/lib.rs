//! In-memory storage backend for Dudwalls.
//!
//! [`InMemoryStore`] implements the same database / collection / document
//! model as the Dudwalls REST API without a server. It is meant for tests,
//! examples and offline development; nothing is persisted.
//!
//! # Quick Start
//!
//! ```ignore
//! use dudwalls::{DudwallsClient, memory::InMemoryStore, query::Filter};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DudwallsClient::new(InMemoryStore::new());
//!     let users = client.database("app").collection("users");
//!
//!     users.insert_one(json!({ "name": "Ann", "age": 31 }).as_object().cloned().unwrap()).await?;
//!     let adults = users.count_documents(Filter::gte("age", 18)).await?;
//!     assert_eq!(adults, 1);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as dudwalls_memory;

pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
