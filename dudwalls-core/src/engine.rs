//! The client-side query engine.
//!
//! Everything here is synchronous and pure: the functions take a borrowed
//! document sequence and return a freshly allocated result. The free functions
//! operate on already-parsed queries and pipelines; [`QueryEngine`] adds JSON
//! entry points that parse with a configured strictness first.

use serde_json::Value;

use crate::{
    aggregate::Pipeline,
    document::Document,
    error::DocumentStoreResult,
    evaluator,
    path::get_path,
    query::{Expr, Query, sort::sort_in_place},
    value::values_equal,
};

pub use crate::evaluator::filter_documents;

/// Runs a `find` query: filter, sort, skip, limit, then projection.
///
/// Absent parts of the query are skipped. The input is never modified.
pub fn apply_query(documents: &[Document], query: &Query) -> Vec<Document> {
    let mut working = match &query.filter {
        Some(filter) => filter_documents(documents, filter),
        None => documents.to_vec(),
    };

    sort_in_place(&mut working, &query.sort);

    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(usize::MAX);
    let window = working.into_iter().skip(skip).take(limit);

    match &query.projection {
        Some(projection) => window.map(|document| projection.apply(&document)).collect(),
        None => window.collect(),
    }
}

/// Returns `true` if `document` satisfies `filter`.
pub fn matches(document: &Document, filter: &Expr) -> bool {
    evaluator::matches(document, filter)
}

/// Runs an aggregation pipeline over `documents`.
pub fn aggregate(documents: &[Document], pipeline: &Pipeline) -> Vec<Document> {
    pipeline.run(documents)
}

/// Collects the distinct values found at `field` across `documents`.
///
/// Documents without the field are skipped. Values are de-duplicated by
/// structural equality (so `1` and `1.0` are the same value) and returned in
/// the order they were first seen.
pub fn distinct_values(documents: &[Document], field: &str) -> Vec<Value> {
    let mut seen: Vec<Value> = Vec::new();

    for value in documents.iter().filter_map(|document| get_path(document, field)) {
        if !seen.iter().any(|existing| values_equal(Some(value), existing)) {
            seen.push(value.clone());
        }
    }

    seen
}

/// Query engine with a configured strictness for JSON inputs.
///
/// ```ignore
/// let engine = QueryEngine::builder().strict(true).build();
/// let adults = engine.find_json(&documents, &json!({ "where": { "age": { "$gte": 18 } } }))?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryEngine {
    strict: bool,
}

impl QueryEngine {
    /// Creates a permissive engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine builder.
    pub fn builder() -> QueryEngineBuilder {
        QueryEngineBuilder::default()
    }

    /// Returns `true` if malformed query parts are rejected instead of skipped.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Parses a `find` option object.
    ///
    /// # Errors
    ///
    /// See [`Query::parse`].
    pub fn parse_query(&self, options: &Value) -> DocumentStoreResult<Query> {
        Query::parse(options, self.strict)
    }

    /// Parses a filter object.
    ///
    /// # Errors
    ///
    /// See [`Expr::parse`].
    pub fn parse_filter(&self, filter: &Value) -> DocumentStoreResult<Expr> {
        Expr::parse(filter, self.strict)
    }

    /// Parses a pipeline array.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::parse`].
    pub fn parse_pipeline(&self, pipeline: &Value) -> DocumentStoreResult<Pipeline> {
        Pipeline::parse(pipeline, self.strict)
    }

    /// See [`apply_query`].
    pub fn apply_query(&self, documents: &[Document], query: &Query) -> Vec<Document> {
        let result = apply_query(documents, query);
        tracing::debug!(input = documents.len(), output = result.len(), "applied query");
        result
    }

    /// See [`matches`].
    pub fn matches(&self, document: &Document, filter: &Expr) -> bool {
        matches(document, filter)
    }

    /// See [`aggregate`].
    pub fn aggregate(&self, documents: &[Document], pipeline: &Pipeline) -> Vec<Document> {
        let result = aggregate(documents, pipeline);
        tracing::debug!(
            input = documents.len(),
            output = result.len(),
            stages = pipeline.stages().len(),
            "ran aggregation pipeline"
        );
        result
    }

    /// See [`distinct_values`].
    pub fn distinct_values(&self, documents: &[Document], field: &str) -> Vec<Value> {
        distinct_values(documents, field)
    }

    /// Parses `options` and runs the query.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidQuery`](crate::error::DocumentStoreError::InvalidQuery)
    /// when the options cannot be parsed.
    pub fn find_json(&self, documents: &[Document], options: &Value) -> DocumentStoreResult<Vec<Document>> {
        let query = self.parse_query(options)?;
        Ok(self.apply_query(documents, &query))
    }

    /// Parses `filter` and evaluates it against one document.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidQuery`](crate::error::DocumentStoreError::InvalidQuery)
    /// when the filter cannot be parsed.
    pub fn matches_json(&self, document: &Document, filter: &Value) -> DocumentStoreResult<bool> {
        let filter = self.parse_filter(filter)?;
        Ok(self.matches(document, &filter))
    }

    /// Parses `pipeline` and runs it.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidQuery`](crate::error::DocumentStoreError::InvalidQuery)
    /// when the pipeline cannot be parsed.
    pub fn aggregate_json(&self, documents: &[Document], pipeline: &Value) -> DocumentStoreResult<Vec<Document>> {
        let pipeline = self.parse_pipeline(pipeline)?;
        Ok(self.aggregate(documents, &pipeline))
    }
}

/// Builder for [`QueryEngine`].
#[derive(Debug, Clone, Default)]
pub struct QueryEngineBuilder {
    strict: bool,
}

impl QueryEngineBuilder {
    /// Rejects malformed query parts instead of skipping them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self) -> QueryEngine {
        QueryEngine { strict: self.strict }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        document::documents_from_value,
        query::{Filter, Projection, SortDirection},
    };

    fn people() -> Vec<Document> {
        documents_from_value(json!([
            {"id": "1", "age": 17, "active": true},
            {"id": "2", "age": 30, "active": true},
            {"id": "3", "age": 40, "active": false},
        ]))
        .unwrap()
    }

    fn as_values(documents: Vec<Document>) -> Vec<Value> {
        documents.into_iter().map(Value::Object).collect()
    }

    #[test]
    fn find_with_filter_only() {
        let result = QueryEngine::new()
            .find_json(&people(), &json!({"where": {"active": true, "age": {"$gte": 18}}}))
            .unwrap();

        assert_eq!(as_values(result), vec![json!({"id": "2", "age": 30, "active": true})]);
    }

    #[test]
    fn sort_skip_and_limit() {
        let result = QueryEngine::new()
            .find_json(&people(), &json!({"orderBy": {"age": "desc"}, "skip": 1, "limit": 1}))
            .unwrap();

        assert_eq!(as_values(result), vec![json!({"id": "2", "age": 30, "active": true})]);
    }

    #[test]
    fn projection_runs_last() {
        let docs = documents_from_value(json!([{"id": "1", "name": "A", "age": 5}])).unwrap();
        let query = Query::builder()
            .filter(Filter::eq("age", 5))
            .sort("age", SortDirection::Asc)
            .select(["name"])
            .build();

        assert_eq!(as_values(apply_query(&docs, &query)), vec![json!({"name": "A"})]);
    }

    #[test]
    fn empty_query_is_identity() {
        let docs = people();
        assert_eq!(apply_query(&docs, &Query::new()), docs);
    }

    #[test]
    fn reapplying_an_empty_query_changes_nothing() {
        let docs = people();
        let queries = [
            Query::new(),
            Query::builder().filter(Filter::eq("active", true)).build(),
            Query::builder().sort("age", SortDirection::Desc).skip(1).limit(1).build(),
            Query::builder().select(["id"]).build(),
            Query::builder().projection(Projection::exclude(["age"])).limit(2).build(),
        ];

        for query in &queries {
            let result = apply_query(&docs, query);
            assert_eq!(apply_query(&result, &Query::new()), result, "{query:?}");
        }
    }

    #[test]
    fn limit_zero_returns_nothing_and_large_skip_is_empty() {
        let docs = people();
        assert!(apply_query(&docs, &Query::builder().limit(0).build()).is_empty());
        assert!(apply_query(&docs, &Query::builder().skip(10).build()).is_empty());
    }

    #[test]
    fn queries_are_idempotent() {
        let docs = people();
        let query = Query::builder()
            .filter(Filter::gte("age", 18))
            .sort("age", SortDirection::Desc)
            .projection(Projection::exclude(["active"]))
            .build();

        let once = apply_query(&docs, &query);
        assert_eq!(apply_query(&once, &Query::new()), once);
        assert_eq!(apply_query(&docs, &query), once);
        assert_eq!(docs, people());
    }

    #[test]
    fn result_is_bounded_by_limit_and_filter() {
        let docs = people();
        for limit in 0..5 {
            let query = Query::builder().filter(Filter::eq("active", true)).limit(limit).build();
            let result = apply_query(&docs, &query);
            assert!(result.len() <= limit.min(2));
            assert!(result.iter().all(|doc| matches(doc, &Filter::eq("active", true))));
        }
    }

    #[test]
    fn aggregate_json_groups() {
        let result = QueryEngine::new()
            .aggregate_json(
                &people(),
                &json!([
                    {"$match": {"active": true}},
                    {"$group": {"_id": null, "count": {"$sum": 1}, "avgAge": {"$avg": "$age"}}},
                ]),
            )
            .unwrap();

        assert_eq!(as_values(result), vec![json!({"_id": "null", "count": 2, "avgAge": 23.5})]);
    }

    #[test]
    fn distinct_values_dedupes_in_first_seen_order() {
        let docs = documents_from_value(json!([
            {"tag": "b"},
            {"tag": "a"},
            {},
            {"tag": "b"},
            {"tag": 1},
            {"tag": 1.0},
            {"tag": null},
        ]))
        .unwrap();

        assert_eq!(distinct_values(&docs, "tag"), vec![json!("b"), json!("a"), json!(1), Value::Null]);
    }

    #[test]
    fn distinct_values_reads_nested_paths() {
        let docs = documents_from_value(json!([
            {"address": {"city": "Oslo"}},
            {"address": {"city": "Bergen"}},
            {"address": "unknown"},
        ]))
        .unwrap();

        assert_eq!(distinct_values(&docs, "address.city"), vec![json!("Oslo"), json!("Bergen")]);
    }

    #[test]
    fn strict_engine_rejects_what_permissive_accepts() {
        let options = json!({"where": {"age": {"$near": 1}}});

        assert!(QueryEngine::new().find_json(&people(), &options).is_ok());
        assert!(QueryEngine::builder().strict(true).build().find_json(&people(), &options).is_err());
    }

    #[test]
    fn find_and_aggregate_skip_the_same_malformed_parts() {
        let permissive = QueryEngine::new();
        let strict = QueryEngine::builder().strict(true).build();
        let docs = people();

        let found = permissive.find_json(&docs, &json!({"where": [], "orderBy": ["age"], "select": "id"})).unwrap();
        let aggregated = permissive.aggregate_json(&docs, &json!([{"$match": []}, {"$sort": ["age"]}])).unwrap();
        assert_eq!(found, docs);
        assert_eq!(aggregated, docs);

        assert!(strict.find_json(&docs, &json!({"orderBy": ["age"]})).is_err());
        assert!(strict.aggregate_json(&docs, &json!([{"$sort": ["age"]}])).is_err());
    }

    #[test]
    fn matches_json_rejects_non_object_filters() {
        let doc = people().remove(0);
        assert!(QueryEngine::new().matches_json(&doc, &json!([1])).is_err());
        assert!(QueryEngine::new().matches_json(&doc, &json!({"age": 17})).unwrap());
    }
}
