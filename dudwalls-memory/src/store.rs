//! In-memory storage implementation.
//!
//! Documents live in insertion order inside `database -> collection` maps
//! guarded by a single async read-write lock.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use mea::rwlock::RwLock;
use serde_json::Value;
use uuid::Uuid;

use dudwalls_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::{Document, ID_FIELD, document_id},
    error::{DocumentStoreError, DocumentStoreResult},
};

type CollectionMap = HashMap<String, Vec<Document>>;
type DatabaseMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory Dudwalls backend.
///
/// Follows the REST server's resource model: databases and collections are
/// created on demand by inserts, documents receive a UUID v4 `id` when they
/// arrive without one, and updates merge top-level fields.
///
/// # Thread Safety
///
/// `InMemoryStore` is cheap to clone. Clones share the same underlying data.
///
/// # Example
///
/// ```ignore
/// use dudwalls_memory::InMemoryStore;
/// use dudwalls::backend::StoreBackend;
///
/// let store = InMemoryStore::new();
/// let stored = store.insert_document("app", "users", json!({"name": "Ann"}).as_object().cloned().unwrap()).await?;
///
/// assert!(stored.contains_key("id"));
/// assert_eq!(store.fetch_all("app", "users").await?.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    databases: Arc<RwLock<DatabaseMap>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            databases: Arc::new(RwLock::new(DatabaseMap::new())),
        }
    }

    /// Creates a builder that can pre-load documents.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    fn from_databases(databases: DatabaseMap) -> Self {
        Self {
            databases: Arc::new(RwLock::new(databases)),
        }
    }
}

fn sorted_names<V>(map: &HashMap<String, V>) -> Vec<String> {
    let mut names: Vec<String> = map.keys().cloned().collect();
    names.sort();
    names
}

fn collection_mut<'a>(
    databases: &'a mut DatabaseMap,
    database: &str,
    collection: &str,
) -> DocumentStoreResult<&'a mut Vec<Document>> {
    databases
        .get_mut(database)
        .ok_or_else(|| DocumentStoreError::DatabaseNotFound(database.to_string()))?
        .get_mut(collection)
        .ok_or_else(|| DocumentStoreError::CollectionNotFound(collection.to_string(), database.to_string()))
}

/// Appends a document, assigning an id first if it has none.
fn insert_into(documents: &mut Vec<Document>, collection: &str, mut document: Document) -> DocumentStoreResult<Document> {
    let id = match document.get(ID_FIELD) {
        None | Some(Value::Null) => {
            let id = Uuid::new_v4().to_string();
            document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
        Some(Value::String(id)) => id.clone(),
        Some(other) => {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "the `{ID_FIELD}` field must be a string, got {other}"
            )));
        }
    };

    if documents.iter().any(|existing| document_id(existing) == Some(id.as_str())) {
        return Err(DocumentStoreError::DocumentAlreadyExists(id, collection.to_string()));
    }

    documents.push(document.clone());

    Ok(document)
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn ping(&self) -> DocumentStoreResult<()> {
        Ok(())
    }

    async fn list_databases(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(sorted_names(&*self.databases.read().await))
    }

    async fn create_database(&self, name: &str) -> DocumentStoreResult<()> {
        self.databases
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_database(&self, name: &str) -> DocumentStoreResult<()> {
        match self.databases.write().await.remove(name) {
            Some(_) => Ok(()),
            None => Err(DocumentStoreError::DatabaseNotFound(name.to_string())),
        }
    }

    async fn list_collections(&self, database: &str) -> DocumentStoreResult<Vec<String>> {
        let databases = self.databases.read().await;

        databases
            .get(database)
            .map(sorted_names)
            .ok_or_else(|| DocumentStoreError::DatabaseNotFound(database.to_string()))
    }

    async fn create_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()> {
        self.databases
            .write()
            .await
            .entry(database.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, database: &str, name: &str) -> DocumentStoreResult<()> {
        let mut databases = self.databases.write().await;
        let collections = databases
            .get_mut(database)
            .ok_or_else(|| DocumentStoreError::DatabaseNotFound(database.to_string()))?;

        match collections.remove(name) {
            Some(_) => Ok(()),
            None => Err(DocumentStoreError::CollectionNotFound(name.to_string(), database.to_string())),
        }
    }

    async fn fetch_all(&self, database: &str, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let databases = self.databases.read().await;

        Ok(databases
            .get(database)
            .and_then(|collections| collections.get(collection))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let databases = self.databases.read().await;

        Ok(databases
            .get(database)
            .and_then(|collections| collections.get(collection))
            .and_then(|documents| documents.iter().find(|doc| document_id(doc) == Some(id)))
            .cloned())
    }

    async fn insert_document(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> DocumentStoreResult<Document> {
        let mut databases = self.databases.write().await;
        let documents = databases
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();

        let stored = insert_into(documents, collection, document)?;
        tracing::trace!(database, collection, id = document_id(&stored), "inserted document");

        Ok(stored)
    }

    async fn update_document(
        &self,
        database: &str,
        collection: &str,
        id: &str,
        update: Document,
    ) -> DocumentStoreResult<Document> {
        let mut databases = self.databases.write().await;
        let documents = collection_mut(&mut databases, database, collection)?;

        let document = documents
            .iter_mut()
            .find(|doc| document_id(doc) == Some(id))
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string()))?;

        for (key, value) in update {
            if key != ID_FIELD {
                document.insert(key, value);
            }
        }

        Ok(document.clone())
    }

    async fn delete_document(&self, database: &str, collection: &str, id: &str) -> DocumentStoreResult<()> {
        let mut databases = self.databases.write().await;
        let documents = collection_mut(&mut databases, database, collection)?;

        let position = documents
            .iter()
            .position(|doc| document_id(doc) == Some(id))
            .ok_or_else(|| DocumentStoreError::DocumentNotFound(id.to_string(), collection.to_string()))?;

        documents.remove(position);

        Ok(())
    }
}

/// Builder for [`InMemoryStore`] that can seed collections.
///
/// # Example
///
/// ```ignore
/// use dudwalls_memory::InMemoryStore;
/// use dudwalls::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder()
///     .with_documents("app", "users", users)
///     .build()
///     .await?;
/// ```
#[derive(Default, Debug)]
pub struct InMemoryStoreBuilder {
    seeds: Vec<(String, String, Vec<Document>)>,
}

impl InMemoryStoreBuilder {
    /// Pre-loads documents into a collection, in order.
    pub fn with_documents(mut self, database: impl Into<String>, collection: impl Into<String>, documents: Vec<Document>) -> Self {
        self.seeds.push((database.into(), collection.into(), documents));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds the store.
    ///
    /// Seeded documents get the same treatment as inserts, so a seed with a
    /// duplicate or non-string `id` fails the build.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut databases = DatabaseMap::new();

        for (database, collection, documents) in self.seeds {
            let target = databases
                .entry(database)
                .or_default()
                .entry(collection.clone())
                .or_default();

            for document in documents {
                insert_into(target, &collection, document)?;
            }
        }

        Ok(InMemoryStore::from_databases(databases))
    }
}
