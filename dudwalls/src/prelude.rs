//! Convenient re-exports of commonly used types.
//!
//! ```ignore
//! use dudwalls::prelude::*;
//! ```
//!
//! This provides the client façade, the backend traits, query and pipeline
//! construction, pagination and the error types.

pub use dudwalls_core::{
    aggregate::{Accumulator, AccumulatorOp, GroupSource, GroupSpec, Pipeline, Stage},
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    client::{Database, DudwallsClient},
    collection::{Collection, TypedCollection},
    document::{Document, Entity, EntityExt},
    engine::{QueryEngine, QueryEngineBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    page::{Page, PaginationParams},
    query::{Condition, Expr, FieldOp, Filter, Projection, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
};

pub use crate::document;
