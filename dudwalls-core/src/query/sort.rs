//! Multi-key document sorting.

use std::cmp::Ordering;

use serde_json::Value;

use crate::{
    document::{Document, type_name},
    error::{DocumentStoreError, DocumentStoreResult},
    path::get_path,
    query::reject,
    value::compare_values,
};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending order; missing and null values first.
    #[default]
    Asc,
    /// Descending order; missing and null values last.
    Desc,
}

impl SortDirection {
    fn parse(value: &Value) -> Option<SortDirection> {
        match value {
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "asc" | "ascending" => Some(SortDirection::Asc),
                "desc" | "descending" => Some(SortDirection::Desc),
                _ => None,
            },
            Value::Number(n) => match n.as_f64() {
                Some(v) if v > 0.0 => Some(SortDirection::Asc),
                Some(v) if v < 0.0 => Some(SortDirection::Desc),
                _ => None,
            },
            _ => None,
        }
    }
}

/// One sort key: a field path and a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field path to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    /// Creates a sort key.
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }

    /// Ascending sort key on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    /// Descending sort key on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }
}

/// Parses `{"age": "desc", "name": "asc"}` into ordered sort keys.
///
/// Directions may be `"asc"`/`"desc"` (any case, long forms allowed) or
/// `1`/`-1`. An unrecognised direction falls back to ascending unless `strict`
/// is set.
pub fn parse_sort(value: &Value, strict: bool) -> DocumentStoreResult<Vec<Sort>> {
    let Value::Object(keys) = value else {
        return Err(DocumentStoreError::invalid_query(format!(
            "sort specification must be a JSON object, got {}",
            type_name(value)
        )));
    };

    let mut sort = Vec::with_capacity(keys.len());
    for (field, direction) in keys {
        let direction = match SortDirection::parse(direction) {
            Some(direction) => direction,
            None => {
                reject(strict, format!("invalid sort direction {direction} for `{field}`"))?;
                SortDirection::Asc
            }
        };
        sort.push(Sort::new(field.clone(), direction));
    }

    Ok(sort)
}

/// Compares two documents key by key; the first unequal key decides.
pub fn compare_documents(a: &Document, b: &Document, sort: &[Sort]) -> Ordering {
    for key in sort {
        let ordering = compare_values(get_path(a, &key.field), get_path(b, &key.field));
        if ordering != Ordering::Equal {
            return match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
        }
    }

    Ordering::Equal
}

/// Stable in-place sort.
pub fn sort_in_place(documents: &mut [Document], sort: &[Sort]) {
    if sort.is_empty() {
        return;
    }

    documents.sort_by(|a, b| compare_documents(a, b, sort));
}

/// Returns a sorted copy of `documents`; full ties keep their input order.
pub fn sort_documents(documents: &[Document], sort: &[Sort]) -> Vec<Document> {
    let mut sorted = documents.to_vec();
    sort_in_place(&mut sorted, sort);
    sorted
}
