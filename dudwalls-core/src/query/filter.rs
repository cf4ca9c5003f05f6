//! Filter expressions.
//!
//! A filter is parsed once into an [`Expr`] tree. Field conditions are a tagged
//! [`Condition`]: either a literal compared for equality, or a set of
//! [`FieldOp`]s that must all hold. A JSON object is read as an operator set
//! when at least one of its keys starts with `$`; otherwise it is a literal.
//!
//! The [`Filter`] helper builds the same trees without going through JSON:
//!
//! ```ignore
//! use dudwalls::query::Filter;
//!
//! let adults = Filter::eq("active", true).and(Filter::gte("age", 18));
//! let staff = Filter::or([Filter::eq("role", "admin"), Filter::any_of("role", ["ops", "dev"])]);
//! ```

use std::{convert::Infallible, fmt};

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value, json};

use crate::{
    document::type_name,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{QueryVisitor, reject},
};

/// A compiled `$regex` pattern together with its source and flags.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    options: Option<String>,
    regex: Regex,
}

impl Pattern {
    /// Compiles a pattern. `options` accepts the MongoDB flags `i`, `m`, `s` and `x`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] for an invalid pattern or flag.
    pub fn new(source: impl Into<String>, options: Option<&str>) -> DocumentStoreResult<Self> {
        let source = source.into();
        let mut builder = RegexBuilder::new(&source);

        for flag in options.unwrap_or_default().chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => {
                    return Err(DocumentStoreError::invalid_query(format!(
                        "unsupported $regex option `{other}`"
                    )));
                }
            };
        }

        let regex = builder
            .build()
            .map_err(|e| DocumentStoreError::invalid_query(format!("invalid $regex `{source}`: {e}")))?;

        Ok(Self {
            source,
            options: options.filter(|o| !o.is_empty()).map(str::to_string),
            regex,
        })
    }

    /// Returns the pattern source.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the flags the pattern was compiled with.
    pub fn options(&self) -> Option<&str> {
        self.options.as_deref()
    }

    /// Tests the pattern against a string (unanchored).
    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

/// Field operators for filter expressions.
///
/// Comparison operands are kept as JSON values; the `$gt` family is only
/// evaluated when its operand is numeric, and `$in`/`$nin` only when theirs is
/// an array. Other operands make the check a no-op.
#[derive(Debug, Clone)]
pub enum FieldOp {
    /// `$eq`: strict equality.
    Eq(Value),
    /// `$ne`: strict inequality.
    Ne(Value),
    /// `$gt`: numeric greater-than.
    Gt(Value),
    /// `$gte`: numeric greater-than-or-equal.
    Gte(Value),
    /// `$lt`: numeric less-than.
    Lt(Value),
    /// `$lte`: numeric less-than-or-equal.
    Lte(Value),
    /// `$in`: the value is a member of the operand array.
    In(Value),
    /// `$nin`: the value is not a member of the operand array.
    Nin(Value),
    /// `$regex`: the value's string form matches the pattern.
    Regex(Pattern),
}

impl FieldOp {
    /// Returns the operator keyword, e.g. `"$gte"`.
    pub fn keyword(&self) -> &'static str {
        match self {
            FieldOp::Eq(_) => "$eq",
            FieldOp::Ne(_) => "$ne",
            FieldOp::Gt(_) => "$gt",
            FieldOp::Gte(_) => "$gte",
            FieldOp::Lt(_) => "$lt",
            FieldOp::Lte(_) => "$lte",
            FieldOp::In(_) => "$in",
            FieldOp::Nin(_) => "$nin",
            FieldOp::Regex(_) => "$regex",
        }
    }
}

/// The condition attached to a field path.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Matches when the field equals the value.
    Literal(Value),
    /// Matches when every operator holds.
    Operators(Vec<FieldOp>),
}

impl Condition {
    fn parse(path: &str, value: &Value, strict: bool) -> DocumentStoreResult<Condition> {
        let operators = match value {
            Value::Object(map) if map.keys().any(|key| key.starts_with('$')) => map,
            literal => return Ok(Condition::Literal(literal.clone())),
        };

        let mut ops = Vec::with_capacity(operators.len());

        for (keyword, operand) in operators {
            let op = match keyword.as_str() {
                "$eq" => FieldOp::Eq(operand.clone()),
                "$ne" => FieldOp::Ne(operand.clone()),
                "$gt" | "$gte" | "$lt" | "$lte" => {
                    if !operand.is_number() {
                        reject(
                            strict,
                            format!("`{keyword}` on `{path}` expects a number, got {}", type_name(operand)),
                        )?;
                    }
                    match keyword.as_str() {
                        "$gt" => FieldOp::Gt(operand.clone()),
                        "$gte" => FieldOp::Gte(operand.clone()),
                        "$lt" => FieldOp::Lt(operand.clone()),
                        _ => FieldOp::Lte(operand.clone()),
                    }
                }
                "$in" | "$nin" => {
                    if !operand.is_array() {
                        reject(
                            strict,
                            format!("`{keyword}` on `{path}` expects an array, got {}", type_name(operand)),
                        )?;
                    }
                    if keyword == "$in" {
                        FieldOp::In(operand.clone())
                    } else {
                        FieldOp::Nin(operand.clone())
                    }
                }
                "$regex" => {
                    let options = operators.get("$options").and_then(Value::as_str);
                    let compiled = match operand {
                        Value::String(source) => Pattern::new(source.as_str(), options),
                        other => Err(DocumentStoreError::invalid_query(format!(
                            "`$regex` on `{path}` expects a string, got {}",
                            type_name(other)
                        ))),
                    };
                    match compiled {
                        Ok(pattern) => FieldOp::Regex(pattern),
                        Err(err) => {
                            reject(strict, err.to_string())?;
                            continue;
                        }
                    }
                }
                "$options" => continue,
                other => {
                    reject(strict, format!("unknown operator `{other}` on `{path}`"))?;
                    continue;
                }
            };

            ops.push(op);
        }

        Ok(Condition::Operators(ops))
    }
}

/// A filter expression over documents.
///
/// An empty [`Expr::And`] matches everything; an empty [`Expr::Or`] matches
/// nothing.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (at least one must match).
    Or(Vec<Expr>),
    /// Condition on the value at a dot-separated field path.
    Field {
        /// The field path to resolve.
        path: String,
        /// The condition the resolved value must satisfy.
        condition: Condition,
    },
}

impl Default for Expr {
    fn default() -> Self {
        Expr::And(Vec::new())
    }
}

impl Expr {
    /// Creates a field expression.
    pub fn field(path: impl Into<String>, condition: Condition) -> Self {
        Expr::Field { path: path.into(), condition }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended
    /// to the list. Otherwise, a new OR expression is created.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Parses a JSON filter such as `{"active": true, "age": {"$gte": 18}}`.
    ///
    /// Top-level keys are ANDed. `$and` and `$or` take arrays of sub-filters.
    ///
    /// # Errors
    ///
    /// Fails if `value` is not an object, or on any malformed part when
    /// `strict` is set.
    pub fn parse(value: &Value, strict: bool) -> DocumentStoreResult<Expr> {
        match value {
            Value::Object(map) => Self::parse_object(map, strict),
            other => Err(DocumentStoreError::invalid_query(format!(
                "filter must be a JSON object, got {}",
                type_name(other)
            ))),
        }
    }

    fn parse_object(map: &Map<String, Value>, strict: bool) -> DocumentStoreResult<Expr> {
        let mut clauses = Vec::with_capacity(map.len());

        for (key, value) in map {
            match key.as_str() {
                "$and" | "$or" => {
                    let Some(items) = value.as_array() else {
                        reject(strict, format!("`{key}` expects an array, got {}", type_name(value)))?;
                        continue;
                    };

                    let mut branches = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::Object(sub) => branches.push(Self::parse_object(sub, strict)?),
                            other => reject(
                                strict,
                                format!("`{key}` entries must be objects, got {}", type_name(other)),
                            )?,
                        }
                    }

                    clauses.push(if key == "$and" { Expr::And(branches) } else { Expr::Or(branches) });
                }
                logical if logical.starts_with('$') => {
                    reject(strict, format!("unknown logical operator `{logical}`"))?;
                }
                path => clauses.push(Expr::Field {
                    path: path.to_string(),
                    condition: Condition::parse(path, value, strict)?,
                }),
            }
        }

        Ok(match clauses.len() {
            1 => clauses.remove(0),
            _ => Expr::And(clauses),
        })
    }

    /// Renders the expression back into the JSON filter syntax.
    pub fn to_json(&self) -> Value {
        match JsonRenderer.visit_expr(self) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

struct JsonRenderer;

impl QueryVisitor for JsonRenderer {
    type Output = Value;
    type Error = Infallible;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        let rendered = exprs
            .iter()
            .map(|expr| self.visit_expr(expr))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(json!({ "$and": rendered }))
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        let rendered = exprs
            .iter()
            .map(|expr| self.visit_expr(expr))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(json!({ "$or": rendered }))
    }

    fn visit_literal(&mut self, path: &str, value: &Value) -> Result<Self::Output, Self::Error> {
        let mut out = Map::new();
        out.insert(path.to_string(), value.clone());
        Ok(Value::Object(out))
    }

    fn visit_operators(&mut self, path: &str, ops: &[FieldOp]) -> Result<Self::Output, Self::Error> {
        let mut rendered = Map::new();
        for op in ops {
            match op {
                FieldOp::Eq(v)
                | FieldOp::Ne(v)
                | FieldOp::Gt(v)
                | FieldOp::Gte(v)
                | FieldOp::Lt(v)
                | FieldOp::Lte(v)
                | FieldOp::In(v)
                | FieldOp::Nin(v) => {
                    rendered.insert(op.keyword().to_string(), v.clone());
                }
                FieldOp::Regex(pattern) => {
                    rendered.insert("$regex".to_string(), Value::String(pattern.as_str().to_string()));
                    if let Some(options) = pattern.options() {
                        rendered.insert("$options".to_string(), Value::String(options.to_string()));
                    }
                }
            }
        }

        let mut out = Map::new();
        out.insert(path.to_string(), Value::Object(rendered));
        Ok(Value::Object(out))
    }
}

/// Helper for constructing filter expressions in code.
pub struct Filter;

impl Filter {
    fn op(field: impl Into<String>, op: FieldOp) -> Expr {
        Expr::field(field, Condition::Operators(vec![op]))
    }

    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Expr::field(field, Condition::Literal(value.into()))
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Self::op(field, FieldOp::Ne(value.into()))
    }

    /// Matches documents where the field is a number greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Self::op(field, FieldOp::Gt(value.into()))
    }

    /// Matches documents where the field is a number greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Self::op(field, FieldOp::Gte(value.into()))
    }

    /// Matches documents where the field is a number less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Self::op(field, FieldOp::Lt(value.into()))
    }

    /// Matches documents where the field is a number less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Expr {
        Self::op(field, FieldOp::Lte(value.into()))
    }

    /// Matches documents where the field equals any of the values (`$in`).
    pub fn any_of<I, V>(field: impl Into<String>, values: I) -> Expr
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::op(field, FieldOp::In(Value::Array(values.into_iter().map(Into::into).collect())))
    }

    /// Matches documents where the field equals none of the values (`$nin`).
    pub fn none_of<I, V>(field: impl Into<String>, values: I) -> Expr
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::op(field, FieldOp::Nin(Value::Array(values.into_iter().map(Into::into).collect())))
    }

    /// Matches documents where the field's string form matches the pattern.
    ///
    /// # Errors
    ///
    /// Fails if the pattern does not compile.
    pub fn regex(field: impl Into<String>, pattern: &str) -> DocumentStoreResult<Expr> {
        Ok(Self::op(field, FieldOp::Regex(Pattern::new(pattern, None)?)))
    }

    /// Combines expressions so that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines expressions so that at least one must match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn multiple_keys_become_a_conjunction() {
        let expr = Expr::parse(&json!({"active": true, "age": {"$gte": 18}}), true).unwrap();

        let Expr::And(clauses) = expr else { panic!("expected AND") };
        assert_eq!(clauses.len(), 2);
        assert!(matches!(&clauses[0], Expr::Field { condition: Condition::Literal(_), .. }));
        assert!(matches!(&clauses[1], Expr::Field { condition: Condition::Operators(ops), .. } if ops.len() == 1));
    }

    #[test]
    fn objects_without_dollar_keys_are_literals() {
        let expr = Expr::parse(&json!({"address": {"city": "Oslo"}}), true).unwrap();
        assert!(matches!(expr, Expr::Field { condition: Condition::Literal(_), .. }));
    }

    #[test]
    fn permissive_parse_drops_unknown_operators() {
        let expr = Expr::parse(&json!({"age": {"$near": 3, "$gt": 1}}), false).unwrap();
        let Expr::Field { condition: Condition::Operators(ops), .. } = expr else { panic!() };
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].keyword(), "$gt");
    }

    #[test]
    fn strict_parse_rejects_malformed_parts() {
        for filter in [
            json!({"age": {"$near": 3}}),
            json!({"role": {"$in": "admin"}}),
            json!({"age": {"$gt": "18"}}),
            json!({"name": {"$regex": "("}}),
            json!({"$and": {"a": 1}}),
            json!({"$or": [1]}),
            json!({"$nor": []}),
        ] {
            let err = Expr::parse(&filter, true).unwrap_err();
            assert!(matches!(err, DocumentStoreError::InvalidQuery(_)), "{filter}");
        }
    }

    #[test]
    fn non_object_filter_fails_in_both_modes() {
        assert!(Expr::parse(&json!([]), false).is_err());
        assert!(Expr::parse(&json!(null), true).is_err());
    }

    #[test]
    fn regex_options_are_applied() {
        let expr = Expr::parse(&json!({"name": {"$regex": "^ann", "$options": "i"}}), true).unwrap();
        let Expr::Field { condition: Condition::Operators(ops), .. } = expr else { panic!() };
        let FieldOp::Regex(pattern) = &ops[0] else { panic!() };

        assert!(pattern.is_match("Annabel"));
        assert_eq!(pattern.options(), Some("i"));
    }

    #[test]
    fn renders_back_to_json() {
        let expr = Filter::eq("active", true).and(Filter::gte("age", 18));
        assert_eq!(
            expr.to_json(),
            json!({"$and": [{"active": true}, {"age": {"$gte": 18}}]})
        );
        assert_eq!(Filter::or([]).to_string(), r#"{"$or":[]}"#);
    }
}
