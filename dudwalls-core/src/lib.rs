//! Core of the Dudwalls Rust SDK.
//!
//! Dudwalls is a document database reached over a JSON REST API. The server
//! stores and returns whole collections; this crate supplies the
//! MongoDB-style layer on top of it:
//!
//! - **Query engine** ([`engine`], [`query`], [`aggregate`]) - filters, multi-key
//!   sorts, pagination, projections and aggregation pipelines evaluated
//!   client-side over JSON documents
//! - **Documents** ([`document`], [`path`], [`value`]) - the document model,
//!   dot-path access and the comparison semantics shared by the engine
//! - **Backends** ([`backend`]) - the async storage trait implemented by the
//!   HTTP and in-memory backends
//! - **Client façade** ([`client`], [`collection`]) - databases, collections and
//!   typed collections over any backend
//! - **Pagination** ([`page`]) and **errors** ([`error`])
//!
//! # Example
//!
//! ```ignore
//! use dudwalls_core::engine::QueryEngine;
//! use serde_json::json;
//!
//! let documents = dudwalls_core::document::documents_from_value(json!([
//!     { "id": "1", "age": 17, "active": true },
//!     { "id": "2", "age": 30, "active": true },
//! ]))?;
//!
//! let adults = QueryEngine::new().find_json(
//!     &documents,
//!     &json!({ "where": { "active": true, "age": { "$gte": 18 } } }),
//! )?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as dudwalls_core;

pub mod aggregate;
pub mod backend;
pub mod client;
pub mod collection;
pub mod document;
pub mod engine;
pub mod error;
mod evaluator;
pub mod page;
pub mod path;
pub mod query;
pub mod value;
