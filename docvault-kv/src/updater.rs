//! Applies update expressions to decoded documents.

use serde_json::{Number, Value};

use docvault_core::{
    document::{RawDocument, is_protected_field},
    update::{UpdateExpr, UpdateOp},
};

/// A number read from a document or increment, keeping integers exact.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Numeric::Int)
                .or_else(|| n.as_f64().map(Numeric::Float)),
            Value::String(s) => s
                .parse::<i64>()
                .map(Numeric::Int)
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(Numeric::Float)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(i) => i as f64,
            Numeric::Float(f) => f,
        }
    }

    fn add(self, other: Numeric) -> Numeric {
        match (self, other) {
            (Numeric::Int(a), Numeric::Int(b)) => a
                .checked_add(b)
                .map(Numeric::Int)
                .unwrap_or_else(|| Numeric::Float(a as f64 + b as f64)),
            (a, b) => Numeric::Float(a.as_f64() + b.as_f64()),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Numeric::Int(i) => Value::from(i),
            Numeric::Float(f) => Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }
}

/// Applies every operation of `update` to `document`, in expression order.
///
/// `internal_id` and `cr_time` are never modified. An `$inc` whose increment
/// is not numeric, or whose target holds a non-numeric value, is skipped.
pub fn apply(document: &mut RawDocument, update: &UpdateExpr) {
    for op in update.ops() {
        match op {
            UpdateOp::Set(fields) => {
                for (field, value) in fields {
                    if !is_protected_field(field) {
                        document.insert(field.clone(), value.clone());
                    }
                }
            }
            UpdateOp::Unset(fields) => {
                for field in fields {
                    if !is_protected_field(field) {
                        document.shift_remove(field);
                    }
                }
            }
            UpdateOp::Inc(fields) => {
                for (field, increment) in fields {
                    if is_protected_field(field) {
                        continue;
                    }

                    let Some(increment) = Numeric::from_value(increment) else {
                        continue;
                    };

                    let next = match document.get(field) {
                        None => increment,
                        Some(current) => match Numeric::from_value(current) {
                            Some(current) => current.add(increment),
                            None => continue,
                        },
                    };

                    document.insert(field.clone(), next.into_value());
                }
            }
            UpdateOp::Replace(field, value) => {
                if !is_protected_field(field) {
                    document.insert(field.clone(), value.clone());
                }
            }
        }
    }
}
