//! Client and database handles.
//!
//! [`DudwallsClient`] owns a backend and hands out cheap [`Database`] handles
//! that borrow it. Databases in turn hand out
//! [`Collection`](crate::collection::Collection)s.
//!
//! # Example
//!
//! ```ignore
//! use dudwalls::{DudwallsClient, memory::InMemoryStore};
//!
//! let client = DudwallsClient::new(InMemoryStore::new());
//! client.create_database("app").await?;
//!
//! let users = client.database("app").collection("users");
//! users.insert_one(json!({ "name": "Ann" }).as_object().cloned().unwrap()).await?;
//! ```

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::{Collection, TypedCollection},
    document::Entity,
    engine::QueryEngine,
    error::DocumentStoreResult,
};

/// Entry point of the SDK, generic over its storage backend.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DudwallsClient<B: StoreBackend> {
    backend: B,
    engine: QueryEngine,
}

impl<B: StoreBackend> DudwallsClient<B> {
    /// Creates a client with a permissive query engine.
    pub fn new(backend: B) -> Self {
        Self::with_engine(backend, QueryEngine::default())
    }

    /// Creates a client whose collections parse JSON queries with `engine`.
    pub fn with_engine(backend: B, engine: QueryEngine) -> Self {
        Self { backend, engine }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the query engine shared by every collection handle.
    pub fn engine(&self) -> QueryEngine {
        self.engine
    }

    /// Checks that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the health check fails.
    pub async fn ping(&self) -> DocumentStoreResult<()> {
        self.backend.ping().await
    }

    /// Lists all database names.
    pub async fn list_databases(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_databases().await
    }

    /// Creates a database.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the database to create
    pub async fn create_database(&self, name: &str) -> DocumentStoreResult<()> {
        tracing::debug!(database = name, "creating database");
        self.backend.create_database(name).await
    }

    /// Drops a database and everything in it.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the database to drop
    pub async fn drop_database(&self, name: &str) -> DocumentStoreResult<()> {
        tracing::debug!(database = name, "dropping database");
        self.backend.drop_database(name).await
    }

    /// Returns a handle to a database. No request is made.
    pub fn database(&self, name: &str) -> Database<'_, B> {
        Database::new(name.to_string(), &self.backend, self.engine)
    }

    /// Erases the backend type.
    pub fn into_dyn(self) -> DudwallsClient<Box<dyn DynStoreBackend>>
    where
        B: 'static,
    {
        DudwallsClient {
            backend: Box::new(self.backend),
            engine: self.engine,
        }
    }

    /// Shuts down the backend, consuming the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to release its resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }
}

/// A named database on a backend.
#[derive(Debug)]
pub struct Database<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
    engine: QueryEngine,
}

impl<'a, B: StoreBackend> Database<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B, engine: QueryEngine) -> Self {
        Self { name, backend, engine }
    }

    /// Returns the database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lists the collections of this database.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections(&self.name).await
    }

    /// Creates a collection in this database.
    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        tracing::debug!(database = %self.name, collection = name, "creating collection");
        self.backend.create_collection(&self.name, name).await
    }

    /// Drops a collection of this database.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        tracing::debug!(database = %self.name, collection = name, "dropping collection");
        self.backend.drop_collection(&self.name, name).await
    }

    /// Returns an untyped collection handle. No request is made.
    pub fn collection(&self, name: &str) -> Collection<'a, B> {
        Collection::new(self.name.clone(), name.to_string(), self.backend, self.engine)
    }

    /// Returns a typed collection handle named by [`Entity::collection_name`].
    pub fn typed_collection<E: Entity>(&self) -> TypedCollection<'a, B, E> {
        TypedCollection::new(self.collection(E::collection_name()))
    }

    /// Drops this database.
    pub async fn drop(self) -> DocumentStoreResult<()> {
        self.backend.drop_database(&self.name).await
    }
}
