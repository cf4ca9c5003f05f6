//! Error types and result types for document store operations.
//!
//! Every fallible operation in the workspace returns [`DocumentStoreResult<T>`].
//! The query engine itself only fails for programmer errors (a filter that is not
//! an object, a pipeline that is not an array) or, in strict mode, for malformed
//! query payloads. Everything else comes from a storage backend.

use std::convert::Infallible;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::document::Document;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting documents to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend construction (bad endpoint, missing credentials, ...).
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The requested database does not exist.
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),
    /// The requested collection does not exist in the database.
    /// The first argument is the collection name, the second is the database name.
    #[error("Collection {0} not found in database {1}")]
    CollectionNotFound(String, String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The value handed to the store is not a document (JSON object), or lacks a required field.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A filter, sort, projection or pipeline could not be parsed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// The request never produced an HTTP response (connect, timeout, body decode).
    #[error("Transport error: {0}")]
    Transport(String),
    /// `insert_many` stopped at a failed insert.
    ///
    /// `inserted` holds the documents stored before the failure, as returned
    /// by the backend; they are not rolled back.
    #[error("insert_many stopped after {} inserted documents: {source}", .inserted.len())]
    PartialInsert {
        /// Documents stored before the failure, in input order.
        inserted: Vec<Document>,
        /// The error that stopped the batch.
        source: Box<DocumentStoreError>,
    },
    /// The server answered with an error status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The `error` message from the response body, or `HTTP <status>`.
        message: String,
    },
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Shorthand for building an [`DocumentStoreError::InvalidQuery`].
    pub fn invalid_query(message: impl Into<String>) -> Self {
        DocumentStoreError::InvalidQuery(message.into())
    }

    /// Returns `true` if this error means the addressed resource does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            DocumentStoreError::DatabaseNotFound(_)
            | DocumentStoreError::CollectionNotFound(..)
            | DocumentStoreError::DocumentNotFound(..) => true,
            DocumentStoreError::Api { status, .. } => *status == 404,
            _ => false,
        }
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<Infallible> for DocumentStoreError {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}
