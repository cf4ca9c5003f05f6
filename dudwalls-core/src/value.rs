//! Comparison semantics over JSON values.
//!
//! The engine needs one notion of equality (filters, `$in`, `distinct`) and one
//! total order (sorting, `$min`/`$max`). Both live here, on [`Comparable`],
//! which also models a missing field explicitly so that "absent" is never
//! confused with `null` in equality checks.

use std::cmp::Ordering;

use serde_json::{Map, Number, Value};

/// Type-erased, comparable view of an optional JSON value.
///
/// Numbers are normalized to `f64`, so `30` and `30.0` compare equal.
#[derive(Debug, Clone)]
pub enum Comparable<'a> {
    /// The field is not present in the document.
    Undefined,
    /// JSON `null`.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// String value.
    String(&'a str),
    /// Array of comparable values.
    Array(Vec<Comparable<'a>>),
    /// Nested object.
    Map(&'a Map<String, Value>),
}

impl<'a> Comparable<'a> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Undefined | Comparable::Null => 0,
            Comparable::Bool(_) => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Map(_) => 5,
        }
    }

    /// Total order used by sorting and `$min`/`$max`.
    ///
    /// Undefined and null sort first (and tie with each other), then booleans,
    /// numbers, strings, arrays (element-wise) and objects (all equal).
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.total_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => {
                for (left, right) in a.iter().zip(b.iter()) {
                    let ordering = left.total_cmp(right);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(value) => Comparable::Number(value.as_f64().unwrap_or(f64::NAN)),
            Value::String(value) => Comparable::String(value),
            Value::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Value::Object(map) => Comparable::Map(map),
        }
    }
}

impl<'a> From<Option<&'a Value>> for Comparable<'a> {
    fn from(value: Option<&'a Value>) -> Self {
        value.map(Comparable::from).unwrap_or(Comparable::Undefined)
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Undefined, Comparable::Undefined) => true,
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.get(key)
                            .is_some_and(|other| Comparable::from(value) == Comparable::from(other))
                    })
            }
            _ => false,
        }
    }
}

/// Structural equality between an optional document value and a literal.
pub fn values_equal(left: Option<&Value>, right: &Value) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

/// Total order between two optional values (see [`Comparable::total_cmp`]).
pub fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    Comparable::from(left).total_cmp(&Comparable::from(right))
}

/// Builds a JSON number, keeping integers integral when the value allows it.
pub fn number_value(value: f64, integral: bool) -> Value {
    if integral && value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Returns `true` if the number has no fractional component in its JSON form.
pub fn is_integral(number: &Number) -> bool {
    number.is_i64() || number.is_u64()
}

/// Canonical JSON serialization used for grouping and de-duplication.
///
/// Floats with no fractional part render as integers so that `1` and `1.0`
/// share a key, and object keys are written in sorted order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Number(number) => match number.as_f64() {
            Some(float) if !is_integral(number) && float.fract() == 0.0 && float.abs() < 9_007_199_254_740_992.0 => {
                out.push_str(&(float as i64).to_string())
            }
            _ => out.push_str(&number.to_string()),
        },
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (index, (key, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// String form of a value: strings verbatim, everything else as canonical JSON.
pub fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => canonical_json(other),
    }
}
