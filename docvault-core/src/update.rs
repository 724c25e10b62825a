//! Update expressions.
//!
//! An update expression is a mapping keyed by operator name (`$set`, `$unset`,
//! `$inc`). Any other key is a direct field replacement. Operators are kept in
//! the order they appear in the expression, which is the order they are applied.

use serde_json::{Map, Value};

use crate::{
    document::RawDocument,
    error::{DocumentStoreError, DocumentStoreResult},
};

pub const SET: &str = "$set";
pub const UNSET: &str = "$unset";
pub const INC: &str = "$inc";

/// A single step of an update expression.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Overwrite or create each field.
    Set(Map<String, Value>),
    /// Remove each field if present.
    Unset(Vec<String>),
    /// Add each increment to the field, creating it if absent.
    Inc(Map<String, Value>),
    /// Replace one top-level field with a value.
    Replace(String, Value),
}

/// An ordered list of update operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpr {
    ops: Vec<UpdateOp>,
}

impl UpdateExpr {
    /// Creates an empty update expression.
    pub fn new() -> Self {
        UpdateExpr::default()
    }

    /// Parses an update expression from its mapping form.
    ///
    /// Operator keys whose operand is not a mapping are ignored.
    pub fn from_raw(raw: RawDocument) -> Self {
        let ops = raw
            .into_iter()
            .filter_map(|(key, value)| match key.as_str() {
                SET => value.as_object().cloned().map(UpdateOp::Set),
                UNSET => value
                    .as_object()
                    .map(|fields| UpdateOp::Unset(fields.keys().cloned().collect())),
                INC => value.as_object().cloned().map(UpdateOp::Inc),
                _ => Some(UpdateOp::Replace(key, value)),
            })
            .collect();

        UpdateExpr { ops }
    }

    /// Parses an update expression from an arbitrary value.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ValidationFailed`] if the value is not a mapping.
    pub fn from_value(value: Value) -> DocumentStoreResult<Self> {
        match value {
            Value::Object(map) => Ok(UpdateExpr::from_raw(map)),
            other => Err(DocumentStoreError::validation(format!(
                "update data must be a mapping, got {other}"
            ))),
        }
    }

    /// Converts the expression back into its mapping form, merging repeated operators.
    pub fn to_raw(&self) -> RawDocument {
        let mut raw = RawDocument::new();

        for op in &self.ops {
            match op {
                UpdateOp::Set(fields) => merge_operator(&mut raw, SET, fields.clone()),
                UpdateOp::Unset(fields) => merge_operator(
                    &mut raw,
                    UNSET,
                    fields
                        .iter()
                        .map(|f| (f.clone(), Value::String(String::new())))
                        .collect(),
                ),
                UpdateOp::Inc(fields) => merge_operator(&mut raw, INC, fields.clone()),
                UpdateOp::Replace(field, value) => {
                    raw.insert(field.clone(), value.clone());
                }
            }
        }

        raw
    }

    /// Returns the operations in application order.
    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    /// Returns `true` if the expression contains no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Appends a `$set` of one field.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fields = Map::new();
        fields.insert(field.into(), value.into());
        self.ops.push(UpdateOp::Set(fields));
        self
    }

    /// Appends an `$unset` of one field.
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(vec![field.into()]));
        self
    }

    /// Appends an `$inc` of one field.
    pub fn inc(mut self, field: impl Into<String>, by: impl Into<Value>) -> Self {
        let mut fields = Map::new();
        fields.insert(field.into(), by.into());
        self.ops.push(UpdateOp::Inc(fields));
        self
    }

    /// Appends a direct replacement of one field.
    pub fn replace(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Replace(field.into(), value.into()));
        self
    }
}

fn merge_operator(raw: &mut RawDocument, operator: &str, fields: Map<String, Value>) {
    match raw
        .entry(operator.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
    {
        Value::Object(existing) => existing.extend(fields),
        slot => *slot = Value::Object(fields),
    }
}
