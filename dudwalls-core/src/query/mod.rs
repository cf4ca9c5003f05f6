//! Query construction and parsing for the client-side query engine.
//!
//! A [`Query`] bundles the options of a `find` call: a filter, a multi-key
//! sort, `skip`/`limit` pagination and a projection. Queries can be assembled
//! with the fluent builder:
//!
//! ```ignore
//! use dudwalls::query::{Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("active", true).and(Filter::gte("age", 18)))
//!     .sort("age", SortDirection::Desc)
//!     .skip(10)
//!     .limit(10)
//!     .select(["name", "age"])
//!     .build();
//! ```
//!
//! or parsed from the JSON option object used by the other Dudwalls SDKs:
//!
//! ```ignore
//! let query = Query::parse(&json!({
//!     "where": { "active": true, "age": { "$gte": 18 } },
//!     "orderBy": { "age": "desc" },
//!     "limit": 10,
//!     "select": ["name", "age"],
//! }), false)?;
//! ```
//!
//! # Strictness
//!
//! Every parser takes a `strict` flag. The default (`false`) is permissive:
//! unknown operators, malformed operands and unknown keys are skipped with a
//! `tracing` warning, which keeps existing query payloads working. With
//! `strict = true` the same inputs are rejected with
//! [`DocumentStoreError::InvalidQuery`]. Inputs that are entirely the wrong
//! shape (a filter that is not an object, a pipeline that is not an array)
//! are rejected in both modes.

pub mod filter;
pub mod projection;
pub mod sort;

use serde_json::Value;

use crate::{
    document::type_name,
    error::{DocumentStoreError, DocumentStoreResult},
};

pub use filter::{Condition, Expr, FieldOp, Filter, Pattern};
pub use projection::Projection;
pub use sort::{Sort, SortDirection};

/// The options of a `find` call.
///
/// The engine applies them in a fixed order: filter, sort, skip, limit,
/// projection.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Optional filter expression to match documents (`where`).
    pub filter: Option<Expr>,
    /// Sort keys in priority order (`orderBy`).
    pub sort: Vec<Sort>,
    /// Number of documents to skip after sorting.
    pub skip: Option<usize>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Field selection applied last (`select`).
    pub projection: Option<Projection>,
}

impl Query {
    /// Creates a new empty query that returns every document unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Returns `true` if the query has no effect on a document sequence.
    pub fn is_empty(&self) -> bool {
        self.filter.is_none()
            && self.sort.is_empty()
            && self.skip.is_none()
            && self.limit.is_none()
            && self.projection.is_none()
    }

    /// Parses the JSON option object `{ where, orderBy, skip, limit, select }`.
    ///
    /// `null` values are treated as absent options.
    ///
    /// # Errors
    ///
    /// Fails if `value` is not an object, or if any option is malformed and
    /// `strict` is set. A permissive parse leaves malformed options unset.
    pub fn parse(value: &Value, strict: bool) -> DocumentStoreResult<Query> {
        let options = value.as_object().ok_or_else(|| {
            DocumentStoreError::invalid_query(format!(
                "query options must be a JSON object, got {}",
                type_name(value)
            ))
        })?;

        let mut query = Query::new();

        for (key, option) in options {
            if option.is_null() {
                continue;
            }

            match key.as_str() {
                "where" if option.is_object() => query.filter = Some(Expr::parse(option, strict)?),
                "orderBy" if option.is_object() => query.sort = sort::parse_sort(option, strict)?,
                "select" if option.is_array() || option.is_object() => {
                    query.projection = Some(Projection::parse(option, strict)?)
                }
                "skip" => query.skip = parse_count("skip", option, strict)?,
                "limit" => query.limit = parse_count("limit", option, strict)?,
                "where" | "orderBy" => {
                    reject(strict, format!("`{key}` expects an object, got {}", type_name(option)))?
                }
                "select" => reject(
                    strict,
                    format!("`select` expects an array or an object, got {}", type_name(option)),
                )?,
                other => reject(strict, format!("unknown query option `{other}`"))?,
            }
        }

        Ok(query)
    }
}

/// Builder for [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Appends a sort key. Keys added earlier take precedence.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort::new(field, direction));
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.query.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Keeps only the listed field paths in each result.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.projection = Some(Projection::include(fields));
        self
    }

    /// Sets an arbitrary projection.
    pub fn projection(mut self, projection: Projection) -> Self {
        self.query.projection = Some(projection);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Visitor over filter expressions.
///
/// The engine evaluates filters with one implementation and renders them back
/// to JSON with another.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_literal(&mut self, path: &str, value: &Value) -> Result<Self::Output, Self::Error>;
    fn visit_operators(
        &mut self,
        path: &str,
        ops: &[FieldOp],
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Field { path, condition: Condition::Literal(value) } => {
                self.visit_literal(path, value)
            }
            Expr::Field { path, condition: Condition::Operators(ops) } => {
                self.visit_operators(path, ops)
            }
        }
    }
}

/// Reports a malformed query part: an error in strict mode, a warning otherwise.
pub(crate) fn reject(strict: bool, message: String) -> DocumentStoreResult<()> {
    if strict {
        return Err(DocumentStoreError::InvalidQuery(message));
    }

    tracing::warn!(%message, "ignoring malformed query part");
    Ok(())
}

/// Reads a non-negative integer (`3` or `3.0`).
pub(crate) fn as_count(value: &Value) -> Option<usize> {
    if let Some(count) = value.as_u64() {
        return usize::try_from(count).ok();
    }

    value
        .as_f64()
        .filter(|float| *float >= 0.0 && float.fract() == 0.0 && *float <= usize::MAX as f64)
        .map(|float| float as usize)
}

pub(crate) fn parse_count(
    name: &str,
    value: &Value,
    strict: bool,
) -> DocumentStoreResult<Option<usize>> {
    match as_count(value) {
        Some(count) => Ok(Some(count)),
        None => {
            reject(strict, format!("`{name}` must be a non-negative integer, got {value}"))?;
            Ok(None)
        }
    }
}
