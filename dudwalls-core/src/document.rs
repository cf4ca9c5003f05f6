//! Document representation and typed entity traits.
//!
//! Dudwalls stores schemaless JSON objects. Inside the SDK a document is an
//! ordered [`serde_json::Map`] (the workspace enables `preserve_order`), so key
//! order survives every engine stage and round trip.
//!
//! Applications that prefer their own structs implement [`Entity`] and use a
//! [`TypedCollection`](crate::collection::TypedCollection):
//!
//! ```ignore
//! use dudwalls::document::Entity;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     pub id: Option<String>,
//!     pub name: String,
//! }
//!
//! impl Entity for User {
//!     fn id(&self) -> Option<&str> {
//!         self.id.as_deref()
//!     }
//!
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, from_value, to_value};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// A single JSON document: an ordered mapping from field names to values.
pub type Document = Map<String, Value>;

/// The reserved field that identifies a document for point operations.
pub const ID_FIELD: &str = "id";

/// A user-defined type that maps onto documents of one collection.
pub trait Entity: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns the server-assigned identifier, if the entity has been stored.
    fn id(&self) -> Option<&str>;

    /// Returns the name of the collection this entity is stored in.
    fn collection_name() -> &'static str;
}

/// Conversions between [`Entity`] values and raw [`Document`]s.
pub trait EntityExt: Entity {
    /// Serializes the entity into a document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the entity does not
    /// serialize to a JSON object.
    fn to_document(&self) -> DocumentStoreResult<Document>;

    /// Deserializes an entity from a document.
    fn from_document(document: Document) -> DocumentStoreResult<Self>;
}

impl<E: Entity> EntityExt for E {
    fn to_document(&self) -> DocumentStoreResult<Document> {
        document_from_value(to_value(self)?)
    }

    fn from_document(document: Document) -> DocumentStoreResult<Self> {
        Ok(from_value(Value::Object(document))?)
    }
}

/// Returns the `id` of a document when it is a string.
pub fn document_id(document: &Document) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}

/// Unwraps a JSON value into a document.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] when the value is not an object.
pub fn document_from_value(value: Value) -> DocumentStoreResult<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

/// Unwraps a JSON array of objects into a document sequence.
///
/// This is the fail-fast guard for callers that hand the engine raw JSON: a
/// value that is not an array, or an array holding non-objects, is rejected
/// instead of producing confusing results further down.
pub fn documents_from_value(value: Value) -> DocumentStoreResult<Vec<Document>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                document_from_value(item).map_err(|_| {
                    DocumentStoreError::InvalidDocument(format!(
                        "element {index} of the document sequence is not an object"
                    ))
                })
            })
            .collect(),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a sequence of documents, got {}",
            type_name(&other)
        ))),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
