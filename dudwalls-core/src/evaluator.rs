//! Filter evaluation against in-memory documents.

use std::convert::Infallible;

use serde_json::Value;

use crate::{
    document::Document,
    path::get_path,
    query::{Expr, FieldOp, QueryVisitor},
    value::{string_form, values_equal},
};

/// Evaluates filter expressions against a single document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> bool {
        match self.visit_expr(expr) {
            Ok(matched) => matched,
            Err(never) => match never {},
        }
    }

    pub fn filter_documents<'d>(
        documents: impl IntoIterator<Item = &'d Document>,
        expr: &Expr,
    ) -> Vec<Document> {
        documents
            .into_iter()
            .filter(|doc| DocumentEvaluator::new(doc).evaluate(expr))
            .cloned()
            .collect()
    }
}

fn compare_numeric(value: Option<&Value>, operand: &Value, check: fn(f64, f64) -> bool) -> bool {
    match operand.as_f64() {
        // Non-numeric operands are not comparisons; the check passes.
        None => true,
        Some(operand) => value
            .and_then(Value::as_f64)
            .is_some_and(|value| check(value, operand)),
    }
}

fn is_member(value: Option<&Value>, operand: &Value) -> Option<bool> {
    operand
        .as_array()
        .map(|items| items.iter().any(|item| values_equal(value, item)))
}

fn evaluate_op(value: Option<&Value>, op: &FieldOp) -> bool {
    match op {
        FieldOp::Eq(expected) => values_equal(value, expected),
        FieldOp::Ne(expected) => !values_equal(value, expected),
        FieldOp::Gt(operand) => compare_numeric(value, operand, |v, o| v > o),
        FieldOp::Gte(operand) => compare_numeric(value, operand, |v, o| v >= o),
        FieldOp::Lt(operand) => compare_numeric(value, operand, |v, o| v < o),
        FieldOp::Lte(operand) => compare_numeric(value, operand, |v, o| v <= o),
        FieldOp::In(operand) => is_member(value, operand).unwrap_or(true),
        FieldOp::Nin(operand) => is_member(value, operand).map(|member| !member).unwrap_or(true),
        FieldOp::Regex(pattern) => value.is_some_and(|v| pattern.is_match(&string_form(v))),
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = Infallible;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_literal(&mut self, path: &str, value: &Value) -> Result<Self::Output, Self::Error> {
        Ok(values_equal(get_path(self.document, path), value))
    }

    fn visit_operators(&mut self, path: &str, ops: &[FieldOp]) -> Result<Self::Output, Self::Error> {
        let value = get_path(self.document, path);

        Ok(ops.iter().all(|op| evaluate_op(value, op)))
    }
}

/// Returns `true` if `document` satisfies `filter`.
pub fn matches(document: &Document, filter: &Expr) -> bool {
    DocumentEvaluator::new(document).evaluate(filter)
}

/// Returns clones of the documents that satisfy `filter`, in input order.
pub fn filter_documents(documents: &[Document], filter: &Expr) -> Vec<Document> {
    DocumentEvaluator::filter_documents(documents, filter)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::query::Filter;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn check(document: Value, filter: Value) -> bool {
        matches(&doc(document), &Expr::parse(&filter, false).unwrap())
    }

    #[test]
    fn literal_equality_is_strict() {
        assert!(check(json!({"a": 1}), json!({"a": 1})));
        assert!(check(json!({"a": 1}), json!({"a": 1.0})));
        assert!(!check(json!({"a": 1}), json!({"a": "1"})));
        assert!(!check(json!({}), json!({"a": null})));
        assert!(check(json!({"a": null}), json!({"a": null})));
    }

    #[test]
    fn nested_paths_resolve() {
        assert!(check(json!({"address": {"city": "Oslo"}}), json!({"address.city": "Oslo"})));
        assert!(!check(json!({"address": "Oslo"}), json!({"address.city": "Oslo"})));
    }

    #[test]
    fn comparison_operators_are_numeric() {
        let d = json!({"age": 30, "name": "Ann"});
        assert!(check(d.clone(), json!({"age": {"$gt": 18, "$lte": 30}})));
        assert!(!check(d.clone(), json!({"age": {"$lt": 30}})));
        assert!(!check(d.clone(), json!({"name": {"$gt": 1}})));
        assert!(!check(d.clone(), json!({"missing": {"$gte": 0}})));
    }

    #[test]
    fn non_numeric_comparison_operand_is_skipped() {
        assert!(check(json!({"age": 5}), json!({"age": {"$gt": "100"}})));
        assert!(check(json!({"age": 5}), json!({"age": {"$gt": "100", "$eq": 5}})));
        assert!(!check(json!({"age": 5}), json!({"age": {"$gt": "100", "$eq": 6}})));
    }

    #[test]
    fn membership_operators() {
        let d = json!({"role": "admin"});
        assert!(check(d.clone(), json!({"role": {"$in": ["admin", "ops"]}})));
        assert!(!check(d.clone(), json!({"role": {"$nin": ["admin"]}})));
        assert!(check(d.clone(), json!({"role": {"$nin": ["user"]}})));
        assert!(!check(d.clone(), json!({"missing": {"$in": ["admin", null]}})));
        assert!(check(d.clone(), json!({"missing": {"$nin": ["admin"]}})));
        // non-array operands are ignored in permissive mode
        assert!(check(d, json!({"role": {"$in": "user"}})));
    }

    #[test]
    fn regex_matches_string_form() {
        assert!(check(json!({"email": "ann@example.com"}), json!({"email": {"$regex": "@example\\."}})));
        assert!(!check(json!({"email": "ann@example.com"}), json!({"email": {"$regex": "^example"}})));
        assert!(!check(json!({"name": "Ann"}), json!({"name": {"$regex": "ann"}})));
        assert!(check(json!({"zip": 1234}), json!({"zip": {"$regex": "^12"}})));
        assert!(!check(json!({}), json!({"zip": {"$regex": ".*"}})));
    }

    #[test]
    fn logical_operators() {
        let d = json!({"a": 1, "b": 2});
        assert!(check(d.clone(), json!({"$or": [{"a": 5}, {"b": 2}]})));
        assert!(!check(d.clone(), json!({"$or": [{"a": 5}, {"b": 5}]})));
        assert!(check(d.clone(), json!({"$and": [{"a": 1}, {"b": 2}]})));
        assert!(!check(d.clone(), json!({"$and": [{"a": 1}, {"b": 3}]})));
        assert!(check(d, json!({"$and": []})));
    }

    #[test]
    fn empty_or_never_matches() {
        assert!(!check(json!({"a": 1}), json!({"$or": []})));
        assert!(!check(json!({}), json!({"$or": []})));
        assert!(!matches(&doc(json!({"a": 1})), &Filter::or([])));
    }

    #[test]
    fn unknown_operators_are_ignored() {
        assert!(check(json!({"a": 1}), json!({"a": {"$near": [0, 0]}})));
        assert!(check(json!({"a": 1}), json!({"$nor": [{"a": 1}]})));
    }

    #[test]
    fn evaluation_is_pure() {
        let d = doc(json!({"a": {"b": 1}}));
        let filter = Filter::eq("a.b", 1);
        let first = matches(&d, &filter);
        let second = matches(&d, &filter);

        assert!(first && second);
        assert_eq!(Value::Object(d), json!({"a": {"b": 1}}));
    }

    #[test]
    fn end_to_end_filter_scenario() {
        let docs = crate::document::documents_from_value(json!([
            {"id": "1", "age": 17, "active": true},
            {"id": "2", "age": 30, "active": true},
            {"id": "3", "age": 40, "active": false},
        ]))
        .unwrap();
        let filter = Expr::parse(&json!({"active": true, "age": {"$gte": 18}}), true).unwrap();

        let result = filter_documents(&docs, &filter);
        assert_eq!(result.len(), 1);
        assert_eq!(Value::Object(result[0].clone()), json!({"id": "2", "age": 30, "active": true}));
    }
}
