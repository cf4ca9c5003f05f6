//! Aggregation pipelines.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s run strictly left to right;
//! each stage consumes the previous stage's output. The stage order is exactly
//! the caller's: `$skip` before `$limit` is not the same pipeline as `$limit`
//! before `$skip`.
//!
//! ```ignore
//! let pipeline = Pipeline::parse(&json!([
//!     { "$match": { "active": true } },
//!     { "$group": { "_id": "$role", "count": { "$sum": 1 }, "avgAge": { "$avg": "$age" } } },
//!     { "$sort": { "count": "desc" } },
//! ]), false)?;
//!
//! let rows = pipeline.run(&documents);
//! ```

use std::{cmp::Ordering, collections::HashMap};

use serde_json::{Map, Value};

use crate::{
    document::{Document, type_name},
    error::{DocumentStoreError, DocumentStoreResult},
    evaluator::filter_documents,
    path::get_path,
    query::{Expr, Sort, parse_count, reject, sort::{parse_sort, sort_in_place}},
    value::{compare_values, is_integral, number_value, string_form},
};

/// Bucket key used for documents whose grouping field is absent.
pub const MISSING_GROUP_KEY: &str = "null";

/// A value source inside a `$group` specification.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupSource {
    /// `"$path"`: the value at a field path of each document.
    FieldRef(String),
    /// Any other value, used as-is.
    Literal(Value),
}

impl GroupSource {
    /// Reads `"$field"` strings as field references and everything else as literals.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) if s.starts_with('$') => GroupSource::FieldRef(s[1..].to_string()),
            other => GroupSource::Literal(other.clone()),
        }
    }

    /// Field reference source.
    pub fn field(path: impl Into<String>) -> Self {
        GroupSource::FieldRef(path.into())
    }

    /// Literal source.
    pub fn literal(value: impl Into<Value>) -> Self {
        GroupSource::Literal(value.into())
    }

    fn resolve<'a>(&'a self, document: &'a Document) -> Option<&'a Value> {
        match self {
            GroupSource::FieldRef(path) => get_path(document, path),
            GroupSource::Literal(value) => Some(value),
        }
    }
}

/// Accumulator operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorOp {
    /// `$sum`
    Sum,
    /// `$avg`
    Avg,
    /// `$min`
    Min,
    /// `$max`
    Max,
}

impl AccumulatorOp {
    fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "$sum" => Some(AccumulatorOp::Sum),
            "$avg" => Some(AccumulatorOp::Avg),
            "$min" => Some(AccumulatorOp::Min),
            "$max" => Some(AccumulatorOp::Max),
            _ => None,
        }
    }
}

/// A per-group reduction such as `{"$avg": "$age"}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub op: AccumulatorOp,
    pub source: GroupSource,
}

impl Accumulator {
    /// `{"$sum": 1}`: number of documents in the group.
    pub fn count() -> Self {
        Self { op: AccumulatorOp::Sum, source: GroupSource::literal(1) }
    }

    pub fn sum(source: GroupSource) -> Self {
        Self { op: AccumulatorOp::Sum, source }
    }

    pub fn avg(source: GroupSource) -> Self {
        Self { op: AccumulatorOp::Avg, source }
    }

    pub fn min(source: GroupSource) -> Self {
        Self { op: AccumulatorOp::Min, source }
    }

    pub fn max(source: GroupSource) -> Self {
        Self { op: AccumulatorOp::Max, source }
    }

    /// Reduces one bucket. `None` means the output field is omitted.
    fn evaluate(&self, bucket: &[&Document]) -> Option<Value> {
        match self.op {
            AccumulatorOp::Sum => {
                let mut total = 0.0;
                let mut integral = true;
                for document in bucket {
                    if let Some(Value::Number(n)) = self.source.resolve(document) {
                        total += n.as_f64().unwrap_or(0.0);
                        integral &= is_integral(n);
                    }
                }
                Some(number_value(total, integral))
            }
            AccumulatorOp::Avg => {
                let numbers = bucket
                    .iter()
                    .filter_map(|document| self.source.resolve(document).and_then(Value::as_f64))
                    .collect::<Vec<_>>();

                let mean = match numbers.len() {
                    0 => 0.0,
                    n => numbers.iter().sum::<f64>() / n as f64,
                };
                Some(number_value(mean, false))
            }
            AccumulatorOp::Min | AccumulatorOp::Max => {
                let wanted = if self.op == AccumulatorOp::Min { Ordering::Less } else { Ordering::Greater };
                let mut best: Option<&Value> = None;

                for value in bucket.iter().filter_map(|document| self.source.resolve(document)) {
                    match best {
                        Some(current) if compare_values(Some(value), Some(current)) != wanted => {}
                        _ => best = Some(value),
                    }
                }

                best.cloned()
            }
        }
    }
}

/// A `$group` stage specification.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    /// What the documents are bucketed by.
    pub id: GroupSource,
    /// Output fields in declaration order.
    pub fields: Vec<(String, Accumulator)>,
}

impl GroupSpec {
    /// Starts a group specification.
    pub fn new(id: GroupSource) -> Self {
        Self { id, fields: Vec::new() }
    }

    /// Groups by the value of a field path.
    pub fn by_field(path: impl Into<String>) -> Self {
        Self::new(GroupSource::field(path))
    }

    /// Puts every document in one group.
    pub fn all() -> Self {
        Self::new(GroupSource::Literal(Value::Null))
    }

    /// Adds an output field.
    pub fn accumulate(mut self, name: impl Into<String>, accumulator: Accumulator) -> Self {
        self.fields.push((name.into(), accumulator));
        self
    }

    fn parse(value: &Value, strict: bool) -> DocumentStoreResult<Option<GroupSpec>> {
        let Value::Object(map) = value else {
            reject(strict, format!("`$group` expects an object, got {}", type_name(value)))?;
            return Ok(None);
        };

        let id = match map.get("_id") {
            Some(id) => GroupSource::from_value(id),
            None => {
                reject(strict, "`$group` requires an `_id`".to_string())?;
                GroupSource::Literal(Value::Null)
            }
        };

        let mut spec = GroupSpec::new(id);

        for (name, accumulator) in map.iter().filter(|(name, _)| name.as_str() != "_id") {
            let parsed = match accumulator {
                Value::Object(inner) if inner.len() == 1 => inner
                    .iter()
                    .next()
                    .and_then(|(keyword, source)| {
                        AccumulatorOp::parse(keyword).map(|op| Accumulator { op, source: GroupSource::from_value(source) })
                    }),
                _ => None,
            };

            match parsed {
                Some(accumulator) => spec.fields.push((name.clone(), accumulator)),
                None => reject(strict, format!("invalid accumulator for `{name}`: {accumulator}"))?,
            }
        }

        Ok(Some(spec))
    }

    fn key_of(&self, document: &Document) -> String {
        match self.id.resolve(document) {
            Some(value) => string_form(value),
            None => MISSING_GROUP_KEY.to_string(),
        }
    }

    /// Buckets the documents and reduces each bucket into one output document.
    ///
    /// Buckets come out in the order their key was first seen.
    pub fn run(&self, documents: &[Document]) -> Vec<Document> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut buckets: Vec<(String, Vec<&Document>)> = Vec::new();

        for document in documents {
            let key = self.key_of(document);
            match index.get(&key) {
                Some(position) => buckets[*position].1.push(document),
                None => {
                    index.insert(key.clone(), buckets.len());
                    buckets.push((key, vec![document]));
                }
            }
        }

        buckets
            .into_iter()
            .map(|(key, bucket)| {
                let mut output = Map::new();
                output.insert("_id".to_string(), Value::String(key));
                for (name, accumulator) in &self.fields {
                    if let Some(value) = accumulator.evaluate(&bucket) {
                        output.insert(name.clone(), value);
                    }
                }
                output
            })
            .collect()
    }
}

/// One pipeline stage.
#[derive(Debug, Clone)]
pub enum Stage {
    /// `$match`: keep documents satisfying the filter.
    Match(Expr),
    /// `$sort`: stable multi-key sort.
    Sort(Vec<Sort>),
    /// `$skip`: drop the first N documents.
    Skip(usize),
    /// `$limit`: keep at most N documents.
    Limit(usize),
    /// `$group`: replace the sequence with one document per group.
    Group(GroupSpec),
}

impl Stage {
    fn apply(&self, documents: Vec<Document>) -> Vec<Document> {
        match self {
            Stage::Match(filter) => filter_documents(&documents, filter),
            Stage::Sort(sort) => {
                let mut documents = documents;
                sort_in_place(&mut documents, sort);
                documents
            }
            Stage::Skip(count) => documents.into_iter().skip(*count).collect(),
            Stage::Limit(count) => documents.into_iter().take(*count).collect(),
            Stage::Group(spec) => spec.run(&documents),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "$match",
            Stage::Sort(_) => "$sort",
            Stage::Skip(_) => "$skip",
            Stage::Limit(_) => "$limit",
            Stage::Group(_) => "$group",
        }
    }
}

/// An ordered aggregation pipeline.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Creates an empty pipeline (the identity).
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stages in execution order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Appends a stage.
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Appends a `$match` stage.
    pub fn filter(self, filter: Expr) -> Self {
        self.stage(Stage::Match(filter))
    }

    /// Appends a `$sort` stage.
    pub fn sort(self, sort: Vec<Sort>) -> Self {
        self.stage(Stage::Sort(sort))
    }

    /// Appends a `$skip` stage.
    pub fn skip(self, count: usize) -> Self {
        self.stage(Stage::Skip(count))
    }

    /// Appends a `$limit` stage.
    pub fn limit(self, count: usize) -> Self {
        self.stage(Stage::Limit(count))
    }

    /// Appends a `$group` stage.
    pub fn group(self, spec: GroupSpec) -> Self {
        self.stage(Stage::Group(spec))
    }

    /// Parses a JSON pipeline: an array of single-key stage objects.
    ///
    /// In permissive mode unknown or malformed stages are dropped, and a stage
    /// object holding several stage keys runs them in the order written.
    ///
    /// # Errors
    ///
    /// Fails if `value` is not an array, or on any malformed stage when
    /// `strict` is set.
    pub fn parse(value: &Value, strict: bool) -> DocumentStoreResult<Pipeline> {
        let Value::Array(raw_stages) = value else {
            return Err(DocumentStoreError::invalid_query(format!(
                "pipeline must be a JSON array, got {}",
                type_name(value)
            )));
        };

        let mut pipeline = Pipeline::new();

        for raw in raw_stages {
            let Value::Object(stage) = raw else {
                reject(strict, format!("pipeline stages must be objects, got {}", type_name(raw)))?;
                continue;
            };

            if stage.len() > 1 {
                reject(strict, format!("a pipeline stage must hold a single operator, got {}", stage.len()))?;
            }

            for (keyword, spec) in stage {
                let parsed = match keyword.as_str() {
                    "$match" if spec.is_object() => Some(Stage::Match(Expr::parse(spec, strict)?)),
                    "$sort" if spec.is_object() => Some(Stage::Sort(parse_sort(spec, strict)?)),
                    "$skip" => parse_count("$skip", spec, strict)?.map(Stage::Skip),
                    "$limit" => parse_count("$limit", spec, strict)?.map(Stage::Limit),
                    "$group" => GroupSpec::parse(spec, strict)?.map(Stage::Group),
                    "$match" | "$sort" => {
                        reject(strict, format!("`{keyword}` expects an object, got {}", type_name(spec)))?;
                        None
                    }
                    other => {
                        reject(strict, format!("unsupported pipeline stage `{other}`"))?;
                        None
                    }
                };

                if let Some(stage) = parsed {
                    pipeline.stages.push(stage);
                }
            }
        }

        Ok(pipeline)
    }

    /// Runs the pipeline over `documents`, returning a new sequence.
    pub fn run(&self, documents: &[Document]) -> Vec<Document> {
        let mut working = documents.to_vec();

        for stage in &self.stages {
            let before = working.len();
            working = stage.apply(working);
            tracing::trace!(stage = stage.name(), before, after = working.len(), "applied pipeline stage");
        }

        working
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::document::documents_from_value;

    fn people() -> Vec<Document> {
        documents_from_value(json!([
            {"id": "1", "age": 17, "active": true},
            {"id": "2", "age": 30, "active": true},
            {"id": "3", "age": 40, "active": false},
        ]))
        .unwrap()
    }

    fn run(pipeline: Value, documents: &[Document]) -> Vec<Value> {
        Pipeline::parse(&pipeline, true)
            .unwrap()
            .run(documents)
            .into_iter()
            .map(Value::Object)
            .collect()
    }

    #[test]
    fn match_then_group_counts_and_averages() {
        let result = run(
            json!([
                {"$match": {"active": true}},
                {"$group": {"_id": null, "count": {"$sum": 1}, "avgAge": {"$avg": "$age"}}},
            ]),
            &people(),
        );

        assert_eq!(result, vec![json!({"_id": "null", "count": 2, "avgAge": 23.5})]);
    }

    #[test]
    fn groups_by_field_in_first_seen_order() {
        let docs = documents_from_value(json!([
            {"role": "user", "age": 20},
            {"role": "admin", "age": 40},
            {"role": "user", "age": 30},
            {"age": 50},
        ]))
        .unwrap();

        let result = run(
            json!([{"$group": {
                "_id": "$role",
                "n": {"$sum": 1},
                "total": {"$sum": "$age"},
                "oldest": {"$max": "$age"},
                "youngest": {"$min": "$age"},
            }}]),
            &docs,
        );

        assert_eq!(
            result,
            vec![
                json!({"_id": "user", "n": 2, "total": 50, "oldest": 30, "youngest": 20}),
                json!({"_id": "admin", "n": 1, "total": 40, "oldest": 40, "youngest": 40}),
                json!({"_id": "null", "n": 1, "total": 50, "oldest": 50, "youngest": 50}),
            ]
        );
    }

    #[test]
    fn avg_of_ten_twenty_thirty_is_twenty() {
        let docs = documents_from_value(json!([{"v": 10}, {"v": 20}, {"v": 30}])).unwrap();
        let result = GroupSpec::all().accumulate("avg", Accumulator::avg(GroupSource::field("v"))).run(&docs);

        assert_eq!(result[0]["avg"].as_f64(), Some(20.0));
    }

    #[test]
    fn avg_ignores_non_numeric_values_and_defaults_to_zero() {
        let docs = documents_from_value(json!([{"v": 10}, {"v": "x"}, {}, {"v": 20}])).unwrap();
        let result = run(json!([{"$group": {"_id": 1, "avg": {"$avg": "$v"}, "none": {"$avg": "$w"}}}]), &docs);

        assert_eq!(result[0]["avg"].as_f64(), Some(15.0));
        assert_eq!(result[0]["none"].as_f64(), Some(0.0));
        assert_eq!(result[0]["_id"], json!("1"));
    }

    #[test]
    fn sum_treats_non_numeric_as_zero() {
        let docs = documents_from_value(json!([{"v": 1.5}, {"v": "2"}, {}, {"v": 2}])).unwrap();
        let result = run(json!([{"$group": {"_id": "all", "s": {"$sum": "$v"}}}]), &docs);

        assert_eq!(result[0]["_id"], json!("all"));
        assert_eq!(result[0]["s"].as_f64(), Some(3.5));
    }

    #[test]
    fn min_max_are_omitted_when_no_values_exist() {
        let docs = documents_from_value(json!([{"a": 1}, {"a": 2}])).unwrap();
        let result = run(json!([{"$group": {"_id": null, "lo": {"$min": "$b"}, "avg": {"$avg": "$b"}}}]), &docs);

        assert_eq!(result, vec![json!({"_id": "null", "avg": 0.0})]);
    }

    #[test]
    fn literal_object_ids_group_together() {
        let docs = documents_from_value(json!([{"a": 1}, {"a": 2}])).unwrap();
        let result = run(json!([{"$group": {"_id": {"k": 1}, "n": {"$sum": 1}}}]), &docs);

        assert_eq!(result, vec![json!({"_id": r#"{"k":1}"#, "n": 2})]);
    }

    #[test]
    fn reordered_object_keys_share_a_bucket() {
        let docs = documents_from_value(json!([
            {"k": {"a": 1, "b": 2}},
            {"k": {"b": 2, "a": 1.0}},
            {"k": {"a": 2}},
        ]))
        .unwrap();
        let result = run(json!([{"$group": {"_id": "$k", "n": {"$sum": 1}}}]), &docs);

        assert_eq!(
            result,
            vec![json!({"_id": r#"{"a":1,"b":2}"#, "n": 2}), json!({"_id": r#"{"a":2}"#, "n": 1})]
        );
        assert_eq!(crate::engine::distinct_values(&docs, "k").len(), result.len());
    }

    #[test]
    fn stage_order_is_authoritative() {
        let docs = documents_from_value(json!([{"i": 0}, {"i": 1}, {"i": 2}, {"i": 3}, {"i": 4}])).unwrap();

        let skip_first = run(json!([{"$skip": 1}, {"$limit": 2}]), &docs);
        let limit_first = run(json!([{"$limit": 2}, {"$skip": 1}]), &docs);

        assert_eq!(skip_first, vec![json!({"i": 1}), json!({"i": 2})]);
        assert_eq!(limit_first, vec![json!({"i": 1})]);
    }

    #[test]
    fn sort_after_group() {
        let result = run(
            json!([
                {"$group": {"_id": "$active", "n": {"$sum": 1}}},
                {"$sort": {"n": "asc"}},
            ]),
            &people(),
        );

        assert_eq!(result, vec![json!({"_id": "false", "n": 1}), json!({"_id": "true", "n": 2})]);
    }

    #[test]
    fn permissive_parse_skips_unknown_stages_and_accumulators() {
        let pipeline = Pipeline::parse(
            &json!([
                {"$unwind": "$tags"},
                {"$limit": -2},
                {"$group": {"_id": null, "n": {"$count": {}}, "c": {"$sum": 1}}},
            ]),
            false,
        )
        .unwrap();

        assert_eq!(pipeline.stages().len(), 1);
        let result = pipeline.run(&people());
        assert_eq!(Value::Object(result[0].clone()), json!({"_id": "null", "c": 3}));
    }

    #[test]
    fn strict_parse_rejects_malformed_pipelines() {
        for pipeline in [
            json!([{"$unwind": "$tags"}]),
            json!([{"$limit": 1.5}]),
            json!([{"$group": {"n": {"$sum": 1}}}]),
            json!([{"$group": {"_id": null, "n": {"$push": "$a"}}}]),
            json!([{"$skip": 1, "$limit": 1}]),
            json!([3]),
        ] {
            assert!(Pipeline::parse(&pipeline, true).is_err(), "{pipeline}");
        }
    }

    #[test]
    fn multi_key_stage_runs_keys_in_order_when_permissive() {
        let docs = documents_from_value(json!([{"i": 0}, {"i": 1}, {"i": 2}])).unwrap();
        let pipeline = Pipeline::parse(&json!([{"$skip": 1, "$limit": 1}]), false).unwrap();

        assert_eq!(pipeline.run(&docs).len(), 1);
        assert_eq!(pipeline.run(&docs)[0]["i"], json!(1));
    }

    #[test]
    fn non_array_pipeline_fails_fast() {
        assert!(Pipeline::parse(&json!({"$match": {}}), false).is_err());
    }

    #[test]
    fn input_documents_are_not_modified() {
        let docs = people();
        let _ = run(json!([{"$sort": {"age": "desc"}}, {"$limit": 1}]), &docs);
        assert_eq!(docs[0]["id"], json!("1"));
        assert_eq!(docs.len(), 3);
    }
}
