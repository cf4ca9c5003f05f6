//! Dot-separated field path access into nested documents.
//!
//! A path such as `"address.city"` walks one object level per segment.
//! Reads through anything that is not an object resolve to `None`. Writes and
//! deletes never replace an existing non-object value: if an intermediate
//! segment holds a scalar or an array, the operation leaves the document as it
//! was.

use serde_json::{Map, Value};

use crate::document::Document;

fn segments(path: &str) -> Option<Vec<&str>> {
    if path.is_empty() {
        return None;
    }

    let parts = path.split('.').collect::<Vec<_>>();
    if parts.iter().any(|part| part.is_empty()) {
        return None;
    }

    Some(parts)
}

/// Reads the value stored at `path`, or `None` if any segment is missing.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let parts = segments(path)?;
    let (last, parents) = parts.split_last()?;

    let mut current = document;
    for part in parents {
        current = current.get(*part)?.as_object()?;
    }

    current.get(*last)
}

/// Writes `value` at `path`, creating missing intermediate objects.
///
/// An intermediate segment that exists but is not an object is kept and the
/// write is dropped.
pub fn set_path(document: &mut Document, path: &str, value: Value) {
    let Some(parts) = segments(path) else {
        return;
    };
    let Some((last, parents)) = parts.split_last() else {
        return;
    };

    let mut current = document;
    for part in parents {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }

    current.insert(last.to_string(), value);
}

/// Removes the value at `path`, returning it. Missing or non-object
/// intermediates make this a no-op.
pub fn delete_path(document: &mut Document, path: &str) -> Option<Value> {
    let parts = segments(path)?;
    let (last, parents) = parts.split_last()?;

    let mut current = document;
    for part in parents {
        current = current.get_mut(*part)?.as_object_mut()?;
    }

    current.shift_remove(*last)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn get_reads_nested_values() {
        let d = doc(json!({"a": {"b": {"c": 3}}, "x": 1}));

        assert_eq!(get_path(&d, "x"), Some(&json!(1)));
        assert_eq!(get_path(&d, "a.b.c"), Some(&json!(3)));
        assert_eq!(get_path(&d, "a.b"), Some(&json!({"c": 3})));
        assert_eq!(get_path(&d, "a.missing"), None);
    }

    #[test]
    fn get_short_circuits_through_scalars_and_empty_segments() {
        let d = doc(json!({"a": 5, "b": [1, 2], "c": {"d": 1}}));

        assert_eq!(get_path(&d, "a.b"), None);
        assert_eq!(get_path(&d, "b.0"), None);
        assert_eq!(get_path(&d, ""), None);
        assert_eq!(get_path(&d, "c..d"), None);
        assert_eq!(get_path(&d, ".c"), None);
    }

    #[test]
    fn set_creates_intermediate_levels() {
        let mut d = Document::new();
        set_path(&mut d, "a.b.c", json!(1));
        set_path(&mut d, "a.z", json!("z"));

        assert_eq!(Value::Object(d), json!({"a": {"b": {"c": 1}, "z": "z"}}));
    }

    #[test]
    fn set_through_scalar_is_a_no_op() {
        let mut d = doc(json!({"a": 5}));
        set_path(&mut d, "a.b", json!(1));
        set_path(&mut d, "", json!(1));

        assert_eq!(Value::Object(d), json!({"a": 5}));
    }

    #[test]
    fn delete_removes_only_the_leaf() {
        let mut d = doc(json!({"a": {"b": 1, "c": 2}}));
        assert_eq!(delete_path(&mut d, "a.b"), Some(json!(1)));
        assert_eq!(Value::Object(d), json!({"a": {"c": 2}}));
    }

    #[test]
    fn delete_through_missing_or_scalar_is_a_no_op() {
        let mut d = doc(json!({"a": 5}));
        assert_eq!(delete_path(&mut d, "a.b"), None);
        assert_eq!(delete_path(&mut d, "x.y"), None);
        assert_eq!(Value::Object(d), json!({"a": 5}));
    }
}
