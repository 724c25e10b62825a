//! Filter evaluation and sorting over decoded documents.
//!
//! Values are compared through [`Comparable`], which normalizes every number to
//! `f64` so that `30` and `30.0` are equal, compares mappings by key set and
//! values, and sequences element-wise.

use std::{cmp::Ordering, collections::HashMap};

use serde_json::Value;

use docvault_core::{
    document::{RawDocument, RawDocumentExt},
    error::DocumentStoreError,
    query::{FieldOp, FieldPredicate, Filter, Predicate, QueryVisitor, Sort, SortDirection},
};

/// Comparable view of a JSON value.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    /// All integers and floats normalized to f64.
    Number(f64),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(value) => value
                .as_f64()
                .map(Comparable::Number)
                .unwrap_or(Comparable::Null),
            Value::String(value) => Comparable::String(value),
            Value::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Value::Object(map) => Comparable::Map(
                map
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> Comparable<'a> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Bool(_) => 2,
            Comparable::Number(_) => 3,
            Comparable::String(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Map(_) => 6,
        }
    }

    /// Total order used for sorting: null < bool < number < string < sequence < mapping.
    ///
    /// Sequences and mappings are not ordered among themselves.
    fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.total_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Coerces a number or numeric string to `f64`.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn structurally_equal(left: &Value, right: &Value) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

pub(crate) struct FilterEvaluator<'a> {
    document: &'a RawDocument,
}

impl<'a> FilterEvaluator<'a> {
    pub fn new(document: &'a RawDocument) -> Self {
        Self { document }
    }
}

impl<'a> QueryVisitor for FilterEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, predicates: &[FieldPredicate]) -> Result<Self::Output, Self::Error> {
        for predicate in predicates {
            if !self.visit_field(&predicate.path, &predicate.predicate)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_field(&mut self, path: &str, predicate: &Predicate) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = self.document.get_path(path) else {
            return Ok(false);
        };

        Ok(match predicate {
            Predicate::Literal(value) => structurally_equal(field_value, value),
            Predicate::Operator(op, operand) => match op {
                FieldOp::Eq => structurally_equal(field_value, operand),
                FieldOp::Ne => !structurally_equal(field_value, operand),
                FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                    match (as_f64(field_value), as_f64(operand)) {
                        (Some(left), Some(right)) => match op {
                            FieldOp::Gt => left > right,
                            FieldOp::Gte => left >= right,
                            FieldOp::Lt => left < right,
                            _ => left <= right,
                        },
                        _ => false,
                    }
                }
                FieldOp::In => match operand {
                    Value::Array(values) => values.iter().any(|v| structurally_equal(field_value, v)),
                    _ => false,
                },
                FieldOp::Nin => match operand {
                    Value::Array(values) => !values.iter().any(|v| structurally_equal(field_value, v)),
                    _ => true,
                },
            },
            Predicate::Unrecognized(_) => false,
        })
    }
}

/// Returns `true` if the document satisfies every predicate of the filter.
pub fn matches(document: &RawDocument, filter: &Filter) -> bool {
    FilterEvaluator::new(document)
        .visit_filter(filter)
        .unwrap_or(false)
}

/// Stable multi-key sort; a missing field sorts before every present value.
pub fn sort_documents(documents: &mut [RawDocument], keys: &[Sort]) {
    if keys.is_empty() {
        return;
    }

    documents.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let ordering = match (a.get_path(&key.field), b.get_path(&key.field)) {
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (Some(left), Some(right)) => Comparable::from(left).total_cmp(&Comparable::from(right)),
                };

                match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

/// Keeps only the listed top-level fields that exist, in the listed order.
///
/// An empty field list keeps the document unchanged.
pub fn project(document: RawDocument, fields: &[String]) -> RawDocument {
    if fields.is_empty() {
        return document;
    }

    fields
        .iter()
        .filter_map(|field| {
            document
                .get(field)
                .map(|value| (field.clone(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> RawDocument {
        value.as_object().cloned().unwrap()
    }

    fn check(document: &RawDocument, filter: Value) -> bool {
        matches(document, &Filter::from_value(filter).unwrap())
    }

    #[test]
    fn comparison_table() {
        let d = doc(json!({ "age": 30 }));

        assert!(check(&d, json!({ "age": { "$gt": 25 } })));
        assert!(check(&d, json!({ "age": { "$gte": 30 } })));
        assert!(!check(&d, json!({ "age": { "$lt": 30 } })));
        assert!(check(&d, json!({ "age": { "$lte": 30.0 } })));
        assert!(check(&d, json!({ "age": { "$in": [10, 20, 30] } })));
        assert!(!check(&d, json!({ "age": { "$nin": [30] } })));
        assert!(check(&d, json!({ "age": { "$ne": 31 } })));
        assert!(check(&d, json!({ "age": 30.0 })));
    }

    #[test]
    fn nested_paths() {
        let d = doc(json!({ "user": { "id": "a1" }, "flat": "x" }));

        assert!(check(&d, json!({ "user.id": "a1" })));
        assert!(!check(&d, json!({ "user.missing": "x" })));
        assert!(!check(&d, json!({ "flat.inner": "x" })));
        assert!(check(&d, json!({ "user": { "id": "a1" } })));
    }

    #[test]
    fn missing_fields_never_match() {
        let d = doc(json!({ "name": "ada" }));

        assert!(!check(&d, json!({ "age": { "$ne": 1 } })));
        assert!(!check(&d, json!({ "age": { "$nin": [1] } })));
        assert!(!check(&d, json!({ "age": null })));
    }

    #[test]
    fn numeric_strings_compare_numerically() {
        let d = doc(json!({ "price": "19.5", "label": "cheap" }));

        assert!(check(&d, json!({ "price": { "$gt": 10 } })));
        assert!(!check(&d, json!({ "label": { "$gt": 0 } })));
        assert!(!check(&d, json!({ "price": 19.5 })));
    }

    #[test]
    fn set_operators_need_sequences() {
        let d = doc(json!({ "tag": "a" }));

        assert!(!check(&d, json!({ "tag": { "$in": "a" } })));
        assert!(check(&d, json!({ "tag": { "$nin": "a" } })));
        assert!(!check(&d, json!({ "tag": { "$regex": "a" } })));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches(&doc(json!({})), &Filter::all()));
    }

    #[test]
    fn sorts_by_multiple_keys_stably() {
        let mut docs = vec![
            doc(json!({ "n": 1, "team": "b", "score": 5 })),
            doc(json!({ "n": 2, "team": "a", "score": 5 })),
            doc(json!({ "n": 3, "team": "a", "score": 9 })),
            doc(json!({ "n": 4, "team": "b", "score": 5 })),
            doc(json!({ "n": 5 })),
        ];

        sort_documents(
            &mut docs,
            &[
                Sort { field: "team".into(), direction: SortDirection::Asc },
                Sort { field: "score".into(), direction: SortDirection::Desc },
            ],
        );

        let order: Vec<i64> = docs.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![5, 3, 2, 1, 4]);
    }

    #[test]
    fn sort_orders_types() {
        let mut docs = vec![
            doc(json!({ "v": "s" })),
            doc(json!({ "v": 2 })),
            doc(json!({ "v": true })),
            doc(json!({ "v": null })),
            doc(json!({ "v": 1.5 })),
        ];

        sort_documents(&mut docs, &[Sort { field: "v".into(), direction: SortDirection::Asc }]);

        let values: Vec<Value> = docs.iter().map(|d| d["v"].clone()).collect();
        assert_eq!(values, vec![json!(null), json!(true), json!(1.5), json!(2), json!("s")]);
    }

    #[test]
    fn projection_keeps_existing_listed_fields() {
        let d = doc(json!({ "a": 1, "b": 2, "c": 3 }));

        assert_eq!(project(d.clone(), &["c".into(), "a".into(), "zz".into()]), doc(json!({ "c": 3, "a": 1 })));
        assert_eq!(project(d.clone(), &[]), d);
    }
}
