//! HTTP backend for Dudwalls.
//!
//! [`HttpStore`] implements [`StoreBackend`](dudwalls_core::backend::StoreBackend)
//! against the Dudwalls REST API (`{endpoint}/api/dudwalls`) with
//! [`reqwest`]. Requests carry a bearer token and a JSON content type; the
//! `{"data": ...}` / `{"error": ...}` response envelopes are unwrapped into
//! payloads and [`DocumentStoreError::Api`](dudwalls_core::error::DocumentStoreError::Api)
//! errors.
//!
//! # Example
//!
//! ```ignore
//! use dudwalls::{DudwallsClient, backend::StoreBackendBuilder, http::HttpStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = HttpStore::builder("https://db.example.com", "my-api-key")
//!         .build()
//!         .await?;
//!
//!     let client = DudwallsClient::new(store);
//!     client.ping().await?;
//!     println!("{:?}", client.list_databases().await?);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as dudwalls_http;

pub mod config;
mod store;

pub use config::HttpStoreConfig;
pub use store::{HttpStore, HttpStoreBuilder};
