//! Translation of filters and update expressions into MongoDB syntax.

use bson::{Bson, Document, doc};
use serde_json::Value;

use docvault_core::{
    document::{CH_TIME, CR_TIME, INTERNAL_ID, is_protected_field},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{FieldPredicate, Predicate, QueryVisitor, Sort},
    update::{INC, SET, UNSET, UpdateExpr, UpdateOp},
};

use crate::convert::to_bson;

/// Translates filters into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, predicates: &[FieldPredicate]) -> Result<Self::Output, Self::Error> {
        let mut clauses = predicates
            .iter()
            .map(|p| self.visit_field(&p.path, &p.predicate))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match clauses.len() {
            0 => doc! {},
            1 => clauses.remove(0),
            _ => doc! { "$and": clauses },
        })
    }

    fn visit_field(&mut self, path: &str, predicate: &Predicate) -> Result<Self::Output, Self::Error> {
        Ok(match predicate {
            Predicate::Literal(value) => doc! { path: to_bson(value)? },
            Predicate::Operator(op, operand) => doc! {
                path: { op.as_operator(): to_bson(operand)? },
            },
            Predicate::Unrecognized(map) => doc! { path: to_bson(&Value::Object(map.clone()))? },
        })
    }
}

/// Builds the `sort` option from sort keys, most significant first.
pub(crate) fn sort_document(sort: &[Sort]) -> Document {
    sort.iter()
        .map(|s| (s.field.clone(), Bson::Int32(s.direction.as_i32())))
        .collect()
}

/// Translates an update expression into a MongoDB update document.
///
/// Direct replacements become `$set` entries, protected fields are dropped and
/// `ch_time` is always set. With `on_insert`, the identifier and creation time
/// of an upserted document are provided through `$setOnInsert`.
pub(crate) fn update_document(
    update: &UpdateExpr,
    stamp: i64,
    on_insert: Option<&str>,
) -> DocumentStoreResult<Document> {
    let mut set = Document::new();
    let mut unset = Document::new();
    let mut inc = Document::new();

    for op in update.ops() {
        match op {
            UpdateOp::Set(fields) => {
                for (field, value) in fields.iter().filter(|(f, _)| !is_protected_field(f)) {
                    set.insert(field.clone(), to_bson(value)?);
                }
            }
            UpdateOp::Unset(fields) => {
                for field in fields.iter().filter(|f| !is_protected_field(f)) {
                    unset.insert(field.clone(), "");
                }
            }
            UpdateOp::Inc(fields) => {
                for (field, value) in fields.iter().filter(|(f, _)| !is_protected_field(f)) {
                    inc.insert(field.clone(), to_bson(value)?);
                }
            }
            UpdateOp::Replace(field, value) => {
                if !is_protected_field(field) {
                    set.insert(field.clone(), to_bson(value)?);
                }
            }
        }
    }

    set.insert(CH_TIME, stamp);

    let mut document = doc! { SET: set };
    if !unset.is_empty() {
        document.insert(UNSET, unset);
    }
    if !inc.is_empty() {
        document.insert(INC, inc);
    }
    if let Some(id) = on_insert {
        document.insert("$setOnInsert", doc! { INTERNAL_ID: id, CR_TIME: stamp });
    }

    Ok(document)
}
