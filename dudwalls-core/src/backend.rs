//! Storage backend abstraction.
//!
//! A backend exposes the Dudwalls resource model: named databases holding
//! named collections of JSON documents. Backends only move whole documents
//! around; filtering, sorting, projection and aggregation happen in the
//! client-side [`engine`](crate::engine) on the sequence returned by
//! [`StoreBackend::fetch_all`].
//!
//! # Traits
//!
//! - [`StoreBackend`]: the core async trait implemented by every backend
//! - [`DynStoreBackend`]: an object-safe mirror used for runtime backend selection
//! - [`StoreBackendBuilder`]: factory trait for constructing backends
//!
//! # Examples
//!
//! ```ignore
//! use dudwalls::backend::StoreBackend;
//! use serde_json::json;
//!
//! let backend = InMemoryStore::new();
//! let document = json!({ "name": "Alice", "age": 30 }).as_object().cloned().unwrap();
//! let stored = backend.insert_document("app", "users", document).await?;
//! let all = backend.fetch_all("app", "users").await?;
//! ```

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{document::Document, error::DocumentStoreResult};

/// Abstract interface for Dudwalls storage backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the client façade shares a single
/// backend between every database and collection handle it hands out.
///
/// # Error Handling
///
/// Lookups of missing resources report the matching `*NotFound` variant of
/// [`DocumentStoreError`](crate::error::DocumentStoreError), except
/// [`get_document`](StoreBackend::get_document) which yields `None`, and
/// [`fetch_all`](StoreBackend::fetch_all) which yields an empty sequence when
/// the backend can tell the collection does not exist.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Checks that the backend is reachable.
    async fn ping(&self) -> DocumentStoreResult<()>;

    /// Lists the names of all databases.
    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>>;

    /// Creates a database.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the database to create
    async fn create_database(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a database together with all of its collections.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the database to drop
    async fn drop_database(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the collection names of a database.
    ///
    /// # Arguments
    ///
    /// * `database` - The database to inspect
    async fn list_collections(&self, database: &str) -> DocumentStoreResult<Vec<String>>;

    /// Creates a collection inside a database.
    ///
    /// # Arguments
    ///
    /// * `database` - The owning database
    /// * `name` - The name of the collection to create
    async fn create_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection and all of its documents.
    ///
    /// # Arguments
    ///
    /// * `database` - The owning database
    /// * `name` - The name of the collection to drop
    async fn drop_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()>;

    /// Returns every document of a collection, in storage order.
    ///
    /// This is the only read path the query engine relies on.
    ///
    /// # Arguments
    ///
    /// * `database` - The owning database
    /// * `collection` - The collection to read
    async fn fetch_all(&self, database: &str, collection: &str) -> DocumentStoreResult<Vec<Document>>;

    /// Retrieves one document by id.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no document with that id exists.
    async fn get_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Inserts a document and returns it as stored (including its `id`).
    ///
    /// # Arguments
    ///
    /// * `database` - The owning database
    /// * `collection` - The target collection
    /// * `document` - The document to insert; an `id` may be assigned by the backend
    async fn insert_document(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Document>;

    /// Applies a partial update to the document with the given id.
    ///
    /// Top-level fields of `update` replace the stored ones; other fields are
    /// kept.
    async fn update_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
        update: Document,
    ) -> DocumentStoreResult<Document>;

    /// Deletes the document with the given id.
    async fn delete_document(&self, database: &str, collection: &str, id: &str) -> DocumentStoreResult<()>;

    /// Releases backend resources. The default implementation does nothing.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn ping(&self) -> DocumentStoreResult<()> {
        (*self).ping().await
    }

    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>> {
        (*self).list_databases().await
    }

    async fn create_database(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).create_database(name).await
    }

    async fn drop_database(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).drop_database(name).await
    }

    async fn list_collections(&self, database: &str) -> DocumentStoreResult<Vec<String>> {
        (*self).list_collections(database).await
    }

    async fn create_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()> {
        (*self).create_collection(database, name).await
    }

    async fn drop_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()> {
        (*self).drop_collection(database, name).await
    }

    async fn fetch_all(&self, database: &str, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        (*self).fetch_all(database, collection).await
    }

    async fn get_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        (*self).get_document(database, collection, id).await
    }

    async fn insert_document(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Document> {
        (*self)
            .insert_document(database, collection, document)
            .await
    }

    async fn update_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
        update: Document,
    ) -> DocumentStoreResult<Document> {
        (*self)
            .update_document(database, collection, id, update)
            .await
    }

    async fn delete_document(&self, database: &str, collection: &str, id: &str) -> DocumentStoreResult<()> {
        (*self).delete_document(database, collection, id).await
    }
}

/// Object-safe counterpart of [`StoreBackend`].
///
/// Every `StoreBackend + 'static` implements it through a blanket impl, and
/// `Box<dyn DynStoreBackend>` implements [`StoreBackend`] again, so a client
/// can be built over either a concrete or an erased backend.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn ping(&self) -> DocumentStoreResult<()>;
    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>>;
    async fn create_database(&self, name: &str) -> DocumentStoreResult<()>;
    async fn drop_database(&self, name: &str) -> DocumentStoreResult<()>;
    async fn list_collections(&self, database: &str) -> DocumentStoreResult<Vec<String>>;
    async fn create_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()>;
    async fn drop_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()>;
    async fn fetch_all(&self, database: &str, collection: &str) -> DocumentStoreResult<Vec<Document>>;
    async fn get_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<Document>>;
    async fn insert_document(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Document>;
    async fn update_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
        update: Document,
    ) -> DocumentStoreResult<Document>;
    async fn delete_document(&self, database: &str, collection: &str, id: &str) -> DocumentStoreResult<()>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn ping(&self) -> DocumentStoreResult<()> {
        StoreBackend::ping(self).await
    }

    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_databases(self).await
    }

    async fn create_database(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::create_database(self, name).await
    }

    async fn drop_database(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_database(self, name).await
    }

    async fn list_collections(&self, database: &str) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(self, database).await
    }

    async fn create_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::create_collection(self, database, name).await
    }

    async fn drop_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_collection(self, database, name).await
    }

    async fn fetch_all(&self, database: &str, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::fetch_all(self, database, collection).await
    }

    async fn get_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::get_document(self, database, collection, id).await
    }

    async fn insert_document(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Document> {
        StoreBackend::insert_document(self, database, collection, document).await
    }

    async fn update_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
        update: Document,
    ) -> DocumentStoreResult<Document> {
        StoreBackend::update_document(self, database, collection, id, update).await
    }

    async fn delete_document(&self, database: &str, collection: &str, id: &str) -> DocumentStoreResult<()> {
        StoreBackend::delete_document(self, database, collection, id).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }
}

#[async_trait]
impl StoreBackend for Box<dyn DynStoreBackend> {
    async fn ping(&self) -> DocumentStoreResult<()> {
        (**self).ping().await
    }

    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>> {
        (**self).list_databases().await
    }

    async fn create_database(&self, name: &str) -> DocumentStoreResult<()> {
        (**self).create_database(name).await
    }

    async fn drop_database(&self, name: &str) -> DocumentStoreResult<()> {
        (**self).drop_database(name).await
    }

    async fn list_collections(&self, database: &str) -> DocumentStoreResult<Vec<String>> {
        (**self).list_collections(database).await
    }

    async fn create_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()> {
        (**self).create_collection(database, name).await
    }

    async fn drop_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()> {
        (**self).drop_collection(database, name).await
    }

    async fn fetch_all(&self, database: &str, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        (**self).fetch_all(database, collection).await
    }

    async fn get_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        (**self).get_document(database, collection, id).await
    }

    async fn insert_document(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Document> {
        (**self)
            .insert_document(database, collection, document)
            .await
    }

    async fn update_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
        update: Document,
    ) -> DocumentStoreResult<Document> {
        (**self)
            .update_document(database, collection, id, update)
            .await
    }

    async fn delete_document(&self, database: &str, collection: &str, id: &str) -> DocumentStoreResult<()> {
        (**self).delete_document(database, collection, id).await
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        <dyn DynStoreBackend>::shutdown_boxed(self).await
    }
}

/// Factory for backends that need asynchronous setup.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
