//! Field projection.

use serde_json::Value;

use crate::{
    document::{Document, type_name},
    error::{DocumentStoreError, DocumentStoreResult},
    path::{delete_path, get_path, set_path},
    query::reject,
};

/// Reduces a document to a subset of its fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Keep only these paths; nested paths rebuild their parent objects.
    Include(Vec<String>),
    /// Copy the whole document, then delete every path mapped to `false`.
    ///
    /// Paths mapped to `true` do nothing in this mode: a mask such as
    /// `{"name": true}` returns the complete document, not just `name`.
    Mask(Vec<(String, bool)>),
}

impl Projection {
    /// Inclusion-list projection.
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Include(fields.into_iter().map(Into::into).collect())
    }

    /// Mask projection that drops the given paths.
    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Mask(fields.into_iter().map(|f| (f.into(), false)).collect())
    }

    /// Parses `["name", "address.city"]` or `{"password": false}`.
    ///
    /// Mask values may be booleans or numbers (`0` drops, anything else keeps).
    pub fn parse(value: &Value, strict: bool) -> DocumentStoreResult<Projection> {
        match value {
            Value::Array(items) => {
                let mut fields = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(path) => fields.push(path.clone()),
                        other => reject(strict, format!("projection paths must be strings, got {other}"))?,
                    }
                }
                Ok(Projection::Include(fields))
            }
            Value::Object(map) => {
                let mut mask = Vec::with_capacity(map.len());
                for (path, flag) in map {
                    let keep = match flag {
                        Value::Bool(keep) => *keep,
                        Value::Number(n) => n.as_f64() != Some(0.0),
                        other => {
                            reject(strict, format!("projection flag for `{path}` must be a boolean, got {other}"))?;
                            continue;
                        }
                    };
                    mask.push((path.clone(), keep));
                }
                Ok(Projection::Mask(mask))
            }
            other => Err(DocumentStoreError::invalid_query(format!(
                "projection must be an array or an object, got {}",
                type_name(other)
            ))),
        }
    }

    /// Applies the projection, returning a new document.
    pub fn apply(&self, document: &Document) -> Document {
        match self {
            Projection::Include(fields) => {
                let mut projected = Document::new();
                for field in fields {
                    if let Some(value) = get_path(document, field) {
                        set_path(&mut projected, field, value.clone());
                    }
                }
                projected
            }
            Projection::Mask(mask) => {
                let mut projected = document.clone();
                for (field, _) in mask.iter().filter(|(_, keep)| !keep) {
                    delete_path(&mut projected, field);
                }
                projected
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn include_keeps_only_requested_fields() {
        let projected = Projection::include(["name"]).apply(&doc(json!({"id": "1", "name": "Ann", "age": 5})));
        assert_eq!(Value::Object(projected), json!({"name": "Ann"}));
    }

    #[test]
    fn include_rebuilds_nested_paths_and_skips_missing_ones() {
        let source = doc(json!({"a": {"b": 1, "c": 2}, "d": 3}));
        let projected = Projection::include(["a.b", "missing", "a.zz"]).apply(&source);

        assert_eq!(Value::Object(projected), json!({"a": {"b": 1}}));
    }

    #[test]
    fn mask_drops_false_paths() {
        let source = doc(json!({"name": "Ann", "secret": {"hash": "x", "salt": "y"}}));
        let projected = Projection::parse(&json!({"secret.hash": false}), true).unwrap().apply(&source);

        assert_eq!(Value::Object(projected), json!({"name": "Ann", "secret": {"salt": "y"}}));
    }

    #[test]
    fn mask_true_entries_do_not_restrict_the_document() {
        let source = doc(json!({"name": "Ann", "age": 5, "role": "admin"}));
        let projected = Projection::parse(&json!({"name": true, "age": 0}), true).unwrap().apply(&source);

        assert_eq!(Value::Object(projected), json!({"name": "Ann", "role": "admin"}));
    }

    #[test]
    fn source_document_is_untouched() {
        let source = doc(json!({"a": {"b": 1}}));
        let _ = Projection::exclude(["a.b"]).apply(&source);
        assert_eq!(Value::Object(source), json!({"a": {"b": 1}}));
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        assert!(Projection::parse(&json!("name"), false).is_err());
        assert!(Projection::parse(&json!([1]), true).is_err());
        assert_eq!(Projection::parse(&json!([1, "a"]), false).unwrap(), Projection::include(["a"]));
        assert!(Projection::parse(&json!({"a": "yes"}), true).is_err());
    }
}
