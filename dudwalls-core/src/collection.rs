//! Collection handles.
//!
//! A [`Collection`] addresses one `(database, collection)` pair on a backend.
//! Point operations (`find_by_id`, `insert_one`, `update_one`, `delete_one`)
//! map onto single backend calls. Everything that selects documents by
//! content fetches the whole collection once and runs the client-side
//! [`engine`](crate::engine) over it.
//!
//! [`TypedCollection`] wraps a collection and converts documents to and from
//! an [`Entity`] type.
//!
//! # Example
//!
//! ```ignore
//! use dudwalls::query::{Filter, Query, SortDirection};
//!
//! let users = client.database("app").collection("users");
//!
//! let adults = users
//!     .find(
//!         Query::builder()
//!             .filter(Filter::gte("age", 18))
//!             .sort("age", SortDirection::Desc)
//!             .limit(10)
//!             .build(),
//!     )
//!     .await?;
//!
//! let roles = users.distinct("role", None).await?;
//! ```

use std::{marker::PhantomData, pin::pin};

use futures::{StreamExt, stream};
use serde_json::Value;

use crate::{
    aggregate::Pipeline,
    backend::StoreBackend,
    document::{Document, Entity, EntityExt, document_id},
    engine::QueryEngine,
    error::{DocumentStoreError, DocumentStoreResult},
    evaluator::filter_documents,
    page::{Page, PaginationParams},
    query::{Expr, Query},
};

/// An untyped collection bound to a backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    database: String,
    name: String,
    backend: &'a B,
    engine: QueryEngine,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(database: String, name: String, backend: &'a B, engine: QueryEngine) -> Self {
        Self { database, name, backend, engine }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the owning database.
    pub fn database(&self) -> &str {
        &self.database
    }

    async fn fetch_all(&self) -> DocumentStoreResult<Vec<Document>> {
        let documents = self.backend.fetch_all(&self.database, &self.name).await?;
        tracing::debug!(
            database = %self.database,
            collection = %self.name,
            count = documents.len(),
            "fetched collection"
        );
        Ok(documents)
    }

    async fn fetch_matching(&self, filter: Option<&Expr>) -> DocumentStoreResult<Vec<Document>> {
        let documents = self.fetch_all().await?;
        Ok(match filter {
            Some(filter) => filter_documents(&documents, filter),
            None => documents,
        })
    }

    /// Runs a query over the collection.
    ///
    /// # Arguments
    ///
    /// * `query` - Filter, sort, skip, limit and projection to apply
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`] if the collection cannot be fetched.
    pub async fn find(&self, query: Query) -> DocumentStoreResult<Vec<Document>> {
        let documents = self.fetch_all().await?;
        Ok(self.engine.apply_query(&documents, &query))
    }

    /// Runs a query given as a JSON option object
    /// (`{ where, orderBy, skip, limit, select }`).
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] before any request is made
    /// if the options cannot be parsed.
    pub async fn find_json(&self, options: &Value) -> DocumentStoreResult<Vec<Document>> {
        let query = self.engine.parse_query(options)?;
        self.find(query).await
    }

    /// Returns the first document matching `filter`, in storage order.
    pub async fn find_one(&self, filter: Expr) -> DocumentStoreResult<Option<Document>> {
        let documents = self.fetch_all().await?;
        Ok(documents
            .into_iter()
            .find(|document| self.engine.matches(document, &filter)))
    }

    /// Fetches a single document by id.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the document does not exist.
    pub async fn find_by_id(&self, id: &str) -> DocumentStoreResult<Option<Document>> {
        self.backend
            .get_document(&self.database, &self.name, id)
            .await
    }

    /// Runs a query and cuts one page out of the result.
    ///
    /// The query's own `skip` and `limit` are applied first; the page window
    /// is taken from what remains.
    pub async fn find_page(&self, query: Query, params: PaginationParams) -> DocumentStoreResult<Page<Document>> {
        let documents = self.find(query).await?;
        Ok(params.paginate(documents))
    }

    /// Inserts a document, returning it as stored.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`] if the backend rejects the document.
    pub async fn insert_one(&self, document: Document) -> DocumentStoreResult<Document> {
        tracing::debug!(database = %self.database, collection = %self.name, "inserting document");
        self.backend
            .insert_document(&self.database, &self.name, document)
            .await
    }

    /// Inserts documents one after another, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failed insert with
    /// [`DocumentStoreError::PartialInsert`], which carries the documents
    /// stored before the failure and the error that stopped the batch.
    pub async fn insert_many(&self, documents: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
        let mut results = pin!(stream::iter(documents).then(|document| self.insert_one(document)));
        let mut inserted = Vec::new();

        while let Some(result) = results.next().await {
            match result {
                Ok(stored) => inserted.push(stored),
                Err(source) => {
                    tracing::warn!(
                        collection = %self.name,
                        inserted = inserted.len(),
                        error = %source,
                        "insert_many stopped"
                    );
                    return Err(DocumentStoreError::PartialInsert {
                        inserted,
                        source: Box::new(source),
                    });
                }
            }
        }

        Ok(inserted)
    }

    /// Applies a partial update to one document.
    ///
    /// # Arguments
    ///
    /// * `id` - The id of the document to update
    /// * `update` - Top-level fields to overwrite
    ///
    /// # Returns
    ///
    /// The document as stored after the update.
    pub async fn update_one(&self, id: &str, update: Document) -> DocumentStoreResult<Document> {
        tracing::debug!(database = %self.database, collection = %self.name, id, "updating document");
        self.backend
            .update_document(&self.database, &self.name, id, update)
            .await
    }

    /// Applies the same partial update to every document matching `filter`.
    ///
    /// Matching documents without a string `id` cannot be addressed and are
    /// skipped.
    ///
    /// # Returns
    ///
    /// The number of updated documents.
    pub async fn update_many(&self, filter: Expr, update: Document) -> DocumentStoreResult<usize> {
        let ids = self.matching_ids(&filter).await?;

        for id in &ids {
            self.update_one(id, update.clone()).await?;
        }

        Ok(ids.len())
    }

    /// Deletes one document by id.
    pub async fn delete_one(&self, id: &str) -> DocumentStoreResult<()> {
        tracing::debug!(database = %self.database, collection = %self.name, id, "deleting document");
        self.backend
            .delete_document(&self.database, &self.name, id)
            .await
    }

    /// Deletes every document matching `filter`.
    ///
    /// # Returns
    ///
    /// The number of deleted documents.
    pub async fn delete_many(&self, filter: Expr) -> DocumentStoreResult<usize> {
        let ids = self.matching_ids(&filter).await?;

        for id in &ids {
            self.delete_one(id).await?;
        }

        Ok(ids.len())
    }

    async fn matching_ids(&self, filter: &Expr) -> DocumentStoreResult<Vec<String>> {
        let matching = self.fetch_matching(Some(filter)).await?;
        let total = matching.len();

        let ids: Vec<String> = matching
            .iter()
            .filter_map(document_id)
            .map(str::to_string)
            .collect();

        if ids.len() < total {
            tracing::warn!(
                collection = %self.name,
                skipped = total - ids.len(),
                "matching documents without an id were skipped"
            );
        }

        Ok(ids)
    }

    /// Number of documents in the collection.
    pub async fn count(&self) -> DocumentStoreResult<usize> {
        Ok(self.fetch_all().await?.len())
    }

    /// Number of documents matching `filter`.
    pub async fn count_documents(&self, filter: Expr) -> DocumentStoreResult<usize> {
        Ok(self.fetch_matching(Some(&filter)).await?.len())
    }

    /// Distinct values of `field`, optionally restricted to documents matching
    /// `filter`. Values come back in first-seen order.
    pub async fn distinct(&self, field: &str, filter: Option<Expr>) -> DocumentStoreResult<Vec<Value>> {
        let documents = self.fetch_matching(filter.as_ref()).await?;
        Ok(self.engine.distinct_values(&documents, field))
    }

    /// Runs an aggregation pipeline over the collection.
    pub async fn aggregate(&self, pipeline: &Pipeline) -> DocumentStoreResult<Vec<Document>> {
        let documents = self.fetch_all().await?;
        Ok(self.engine.aggregate(&documents, pipeline))
    }

    /// Runs an aggregation pipeline given as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] before any request is made
    /// if the pipeline cannot be parsed.
    pub async fn aggregate_json(&self, pipeline: &Value) -> DocumentStoreResult<Vec<Document>> {
        let pipeline = self.engine.parse_pipeline(pipeline)?;
        self.aggregate(&pipeline).await
    }

    /// Drops the collection.
    pub async fn drop(self) -> DocumentStoreResult<()> {
        self.backend
            .drop_collection(&self.database, &self.name)
            .await
    }
}

/// A collection whose documents are (de)serialized as `E`.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
/// * `E` - The entity type stored in this collection
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, E: Entity> {
    inner: Collection<'a, B>,
    _marker: PhantomData<E>,
}

impl<'a, B: StoreBackend, E: Entity> TypedCollection<'a, B, E> {
    pub(crate) fn new(inner: Collection<'a, B>) -> Self {
        Self { inner, _marker: PhantomData }
    }

    /// Returns the untyped collection underneath.
    pub fn untyped(&self) -> &Collection<'a, B> {
        &self.inner
    }

    /// Runs a query and deserializes the results.
    ///
    /// A projection that drops fields the entity requires makes
    /// deserialization fail; use [`untyped`](Self::untyped) for such queries.
    pub async fn find(&self, query: Query) -> DocumentStoreResult<Vec<E>> {
        self.inner
            .find(query)
            .await?
            .into_iter()
            .map(<E as EntityExt>::from_document)
            .collect()
    }

    /// Runs a query and deserializes one page of the results.
    pub async fn find_page(&self, query: Query, params: PaginationParams) -> DocumentStoreResult<Page<E>> {
        self.inner
            .find_page(query, params)
            .await?
            .try_map(<E as EntityExt>::from_document)
    }

    /// Returns the first entity matching `filter`.
    pub async fn find_one(&self, filter: Expr) -> DocumentStoreResult<Option<E>> {
        self.inner
            .find_one(filter)
            .await?
            .map(<E as EntityExt>::from_document)
            .transpose()
    }

    /// Fetches one entity by id.
    pub async fn find_by_id(&self, id: &str) -> DocumentStoreResult<Option<E>> {
        self.inner
            .find_by_id(id)
            .await?
            .map(<E as EntityExt>::from_document)
            .transpose()
    }

    /// Inserts an entity and returns it as stored, with its assigned id.
    pub async fn insert_one(&self, entity: &E) -> DocumentStoreResult<E> {
        let stored = self.inner.insert_one(entity.to_document()?).await?;
        <E as EntityExt>::from_document(stored)
    }

    /// Writes every field of a stored entity back to its document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the entity has no id.
    pub async fn update_one(&self, entity: &E) -> DocumentStoreResult<E> {
        let id = entity.id().ok_or_else(|| {
            DocumentStoreError::InvalidDocument(format!(
                "cannot update an entity of `{}` without an id",
                E::collection_name()
            ))
        })?;

        let stored = self.inner.update_one(id, entity.to_document()?).await?;
        <E as EntityExt>::from_document(stored)
    }

    /// Deletes one entity by id.
    pub async fn delete_one(&self, id: &str) -> DocumentStoreResult<()> {
        self.inner.delete_one(id).await
    }

    /// Number of stored entities.
    pub async fn count(&self) -> DocumentStoreResult<usize> {
        self.inner.count().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{client::DudwallsClient, document::documents_from_value, query::Filter};

    /// Serves a fixed collection and records every write.
    #[derive(Debug, Default)]
    struct FixtureBackend {
        documents: Vec<Document>,
        fetches: AtomicUsize,
        writes: Mutex<Vec<String>>,
    }

    impl FixtureBackend {
        fn with(documents: Value) -> Self {
            Self {
                documents: documents_from_value(documents).unwrap(),
                ..Self::default()
            }
        }

        fn record(&self, entry: String) {
            self.writes.lock().unwrap().push(entry);
        }

        fn writes(&self) -> Vec<String> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StoreBackend for FixtureBackend {
        async fn ping(&self) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn list_databases(&self) -> DocumentStoreResult<Vec<String>> {
            Ok(vec!["app".to_string()])
        }

        async fn create_database(&self, _name: &str) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn drop_database(&self, _name: &str) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn list_collections(&self, _database: &str) -> DocumentStoreResult<Vec<String>> {
            Ok(vec!["items".to_string()])
        }

        async fn create_collection(&self, _database: &str, _name: &str) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn drop_collection(&self, _database: &str, _name: &str) -> DocumentStoreResult<()> {
            Ok(())
        }

        async fn fetch_all(&self, _database: &str, _collection: &str) -> DocumentStoreResult<Vec<Document>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.documents.clone())
        }

        async fn get_document(&self, _database: &str, _collection: &str, id: &str) -> DocumentStoreResult<Option<Document>> {
            Ok(self.documents.iter().find(|doc| document_id(doc) == Some(id)).cloned())
        }

        async fn insert_document(&self, _database: &str, collection: &str, document: Document) -> DocumentStoreResult<Document> {
            let id = document_id(&document).unwrap_or_default().to_string();
            if self.writes().contains(&format!("insert {id}")) {
                return Err(DocumentStoreError::DocumentAlreadyExists(id, collection.to_string()));
            }

            self.record(format!("insert {id}"));
            Ok(document)
        }

        async fn update_document(&self, _database: &str, _collection: &str, id: &str, mut update: Document) -> DocumentStoreResult<Document> {
            self.record(format!("update {id}"));
            update.insert("id".to_string(), json!(id));
            Ok(update)
        }

        async fn delete_document(&self, _database: &str, _collection: &str, id: &str) -> DocumentStoreResult<()> {
            self.record(format!("delete {id}"));
            Ok(())
        }
    }

    fn fixture() -> FixtureBackend {
        FixtureBackend::with(json!([
            {"id": "a", "kind": "x", "n": 1},
            {"kind": "x", "n": 2},
            {"id": "c", "kind": "y", "n": 3},
            {"id": "d", "kind": "x", "n": 4},
        ]))
    }

    #[tokio::test]
    async fn malformed_queries_fail_before_fetching() {
        let client = DudwallsClient::new(fixture());
        let items = client.database("app").collection("items");

        assert!(items.find_json(&json!([{"where": {}}])).await.is_err());
        assert!(items.aggregate_json(&json!({"$match": {}})).await.is_err());
        assert_eq!(client.backend().fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn find_one_returns_first_match_in_storage_order() {
        let client = DudwallsClient::new(fixture());
        let items = client.database("app").collection("items");

        let found = items.find_one(Filter::gt("n", 1)).await.unwrap().unwrap();
        assert_eq!(found.get("n"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn insert_many_is_sequential_and_fails_fast() {
        let client = DudwallsClient::new(FixtureBackend::default());
        let items = client.database("app").collection("items");

        let batch = documents_from_value(json!([{"id": "1"}, {"id": "2"}, {"id": "1"}, {"id": "3"}])).unwrap();

        match items.insert_many(batch).await {
            Err(DocumentStoreError::PartialInsert { inserted, source }) => {
                let ids: Vec<_> = inserted.iter().filter_map(document_id).collect();
                assert_eq!(ids, ["1", "2"]);
                assert!(matches!(*source, DocumentStoreError::DocumentAlreadyExists(..)));
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(client.backend().writes(), ["insert 1", "insert 2"]);
    }

    #[tokio::test]
    async fn insert_many_reports_a_failed_first_insert_with_nothing_inserted() {
        let backend = FixtureBackend::default();
        backend.record("insert 1".to_string());
        let client = DudwallsClient::new(backend);
        let items = client.database("app").collection("items");

        let batch = documents_from_value(json!([{"id": "1"}, {"id": "2"}])).unwrap();
        let err = items.insert_many(batch).await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::PartialInsert { ref inserted, .. } if inserted.is_empty()));
        assert_eq!(client.backend().writes(), ["insert 1"]);
    }

    #[tokio::test]
    async fn bulk_writes_skip_documents_without_ids() {
        let client = DudwallsClient::new(fixture());
        let items = client.database("app").collection("items");

        let updated = items
            .update_many(Filter::eq("kind", "x"), documents_from_value(json!([{"seen": true}])).unwrap().remove(0))
            .await
            .unwrap();
        let deleted = items.delete_many(Filter::gte("n", 3)).await.unwrap();

        assert_eq!(updated, 2);
        assert_eq!(deleted, 2);
        assert_eq!(client.backend().writes(), ["update a", "update d", "delete c", "delete d"]);
    }

    #[tokio::test]
    async fn update_one_returns_the_backend_document() {
        let client = DudwallsClient::new(fixture());
        let items = client.database("app").collection("items");

        let update = documents_from_value(json!([{"seen": true}])).unwrap().remove(0);
        let stored = items.update_one("c", update).await.unwrap();

        assert_eq!(Value::Object(stored), json!({"seen": true, "id": "c"}));
        assert_eq!(client.backend().writes(), ["update c"]);
    }

    #[tokio::test]
    async fn find_page_applies_query_then_window() {
        let client = DudwallsClient::new(fixture());
        let items = client.database("app").collection("items");

        let page = items
            .find_page(
                Query::builder().filter(Filter::eq("kind", "x")).build(),
                PaginationParams::new(2, 2),
            )
            .await
            .unwrap();

        assert_eq!(page.count, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].get("id"), Some(&json!("d")));
    }
}
