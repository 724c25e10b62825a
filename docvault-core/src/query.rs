//! Filter, sort and read-query model for document stores.
//!
//! A [`Filter`] is an implicit conjunction of per-field predicates. Each
//! predicate targets a dot-separated field path and is either a literal (structural
//! equality) or a single comparison operator. Filters are usually parsed from
//! their mapping form:
//!
//! ```ignore
//! use docvault_core::query::Filter;
//! use serde_json::json;
//!
//! let filter = Filter::from_value(json!({
//!     "status": "active",
//!     "age": { "$gte": 18 },
//!     "user.id": { "$in": ["a1", "b2"] },
//! }))?;
//! ```
//!
//! or built fluently:
//!
//! ```ignore
//! let filter = Filter::eq("status", "active").and(Filter::gte("age", 18));
//! ```
//!
//! Backends consume filters through the [`QueryVisitor`] trait.

use serde_json::{Map, Value};

use crate::{
    document::RawDocument,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Structural equality (`$eq`).
    Eq,
    /// Structural inequality (`$ne`).
    Ne,
    /// Numeric greater than (`$gt`).
    Gt,
    /// Numeric greater than or equal to (`$gte`).
    Gte,
    /// Numeric less than (`$lt`).
    Lt,
    /// Numeric less than or equal to (`$lte`).
    Lte,
    /// Membership in a literal sequence (`$in`).
    In,
    /// Non-membership in a literal sequence (`$nin`).
    Nin,
}

impl FieldOp {
    /// Parses an operator key such as `"$gte"`.
    pub fn from_operator(key: &str) -> Option<Self> {
        match key {
            "$eq" => Some(FieldOp::Eq),
            "$ne" => Some(FieldOp::Ne),
            "$gt" => Some(FieldOp::Gt),
            "$gte" => Some(FieldOp::Gte),
            "$lt" => Some(FieldOp::Lt),
            "$lte" => Some(FieldOp::Lte),
            "$in" => Some(FieldOp::In),
            "$nin" => Some(FieldOp::Nin),
            _ => None,
        }
    }

    /// Returns the operator key for this operator.
    pub fn as_operator(&self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::In => "$in",
            FieldOp::Nin => "$nin",
        }
    }
}

/// The condition applied to the value found at a field path.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Structural equality with a literal value.
    Literal(Value),
    /// A recognized comparison operator and its operand.
    Operator(FieldOp, Value),
    /// An operator mapping with no recognized operator. Never matches.
    Unrecognized(Map<String, Value>),
}

impl Predicate {
    /// Classifies a filter value.
    ///
    /// A non-empty mapping whose keys all start with `$` is an operator mapping;
    /// the first recognized operator in key order is used. Any other value,
    /// including plain nested mappings, is a literal.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => {
                let recognized = map
                    .iter()
                    .find_map(|(k, v)| FieldOp::from_operator(k).map(|op| (op, v.clone())));

                match recognized {
                    Some((op, operand)) => Predicate::Operator(op, operand),
                    None => Predicate::Unrecognized(map),
                }
            }
            other => Predicate::Literal(other),
        }
    }

    /// Converts the predicate back into its filter-value form.
    pub fn to_value(&self) -> Value {
        match self {
            Predicate::Literal(value) => value.clone(),
            Predicate::Operator(op, operand) => {
                let mut map = Map::new();
                map.insert(op.as_operator().to_string(), operand.clone());
                Value::Object(map)
            }
            Predicate::Unrecognized(map) => Value::Object(map.clone()),
        }
    }
}

/// A predicate bound to a dot-separated field path.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPredicate {
    /// Dot-separated path into nested mappings, e.g. `"user.id"`.
    pub path: String,
    /// The condition evaluated at that path.
    pub predicate: Predicate,
}

/// A conjunction of field predicates. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<FieldPredicate>,
}

impl Filter {
    /// Creates a filter that matches every document.
    pub fn all() -> Self {
        Filter::default()
    }

    /// Builds a filter from its mapping form. Every top-level key is one predicate.
    pub fn from_raw(raw: RawDocument) -> Self {
        Filter {
            predicates: raw
                .into_iter()
                .map(|(path, value)| FieldPredicate {
                    path,
                    predicate: Predicate::from_value(value),
                })
                .collect(),
        }
    }

    /// Builds a filter from an arbitrary value; `null` means "match everything".
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ValidationFailed`] if the value is neither a
    /// mapping nor `null`.
    pub fn from_value(value: Value) -> DocumentStoreResult<Self> {
        match value {
            Value::Null => Ok(Filter::all()),
            Value::Object(map) => Ok(Filter::from_raw(map)),
            other => Err(DocumentStoreError::validation(format!(
                "filter must be a mapping, got {other}"
            ))),
        }
    }

    /// Converts the filter back into its mapping form.
    pub fn to_raw(&self) -> RawDocument {
        self.predicates
            .iter()
            .map(|p| (p.path.clone(), p.predicate.to_value()))
            .collect()
    }

    /// Returns the individual field predicates.
    pub fn predicates(&self) -> &[FieldPredicate] {
        &self.predicates
    }

    /// Returns `true` if the filter has no predicates.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Combines this filter with another; both must match.
    pub fn and(mut self, other: Filter) -> Self {
        self.predicates.extend(other.predicates);
        self
    }

    fn single(path: impl Into<String>, predicate: Predicate) -> Self {
        Filter {
            predicates: vec![FieldPredicate { path: path.into(), predicate }],
        }
    }

    fn op(path: impl Into<String>, op: FieldOp, value: impl Into<Value>) -> Self {
        Filter::single(path, Predicate::Operator(op, value.into()))
    }

    /// Matches documents whose field equals the literal value.
    pub fn literal(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::single(path, Predicate::Literal(value.into()))
    }

    /// `$eq`
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::op(path, FieldOp::Eq, value)
    }

    /// `$ne`
    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::op(path, FieldOp::Ne, value)
    }

    /// `$gt`
    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::op(path, FieldOp::Gt, value)
    }

    /// `$gte`
    pub fn gte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::op(path, FieldOp::Gte, value)
    }

    /// `$lt`
    pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::op(path, FieldOp::Lt, value)
    }

    /// `$lte`
    pub fn lte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::op(path, FieldOp::Lte, value)
    }

    /// `$in`: the field equals one of the values.
    pub fn any_of(path: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Filter::op(path, FieldOp::In, Value::Array(values.into_iter().map(Into::into).collect()))
    }

    /// `$nin`: the field equals none of the values.
    pub fn none_of(path: impl Into<String>, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Filter::op(path, FieldOp::Nin, Value::Array(values.into_iter().map(Into::into).collect()))
    }
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order, written as `1`.
    Asc,
    /// Descending order, written as `-1`.
    Desc,
}

impl SortDirection {
    /// Parses `1` / `-1`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ValidationFailed`] for any other value.
    pub fn from_value(value: &Value) -> DocumentStoreResult<Self> {
        match value.as_i64() {
            Some(1) => Ok(SortDirection::Asc),
            Some(-1) => Ok(SortDirection::Desc),
            _ => Err(DocumentStoreError::validation(format!(
                "sort direction must be 1 or -1, got {value}"
            ))),
        }
    }

    /// Returns `1` or `-1`.
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// Dot-separated field path to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Parses an ordered `{field: 1 | -1}` mapping into sort keys.
///
/// # Errors
///
/// Returns [`DocumentStoreError::ValidationFailed`] if any direction is invalid.
pub fn sort_from_raw(raw: &RawDocument) -> DocumentStoreResult<Vec<Sort>> {
    raw.iter()
        .map(|(field, direction)| {
            Ok(Sort {
                field: field.clone(),
                direction: SortDirection::from_value(direction)?,
            })
        })
        .collect()
}

/// A read request: filter, projection, sort and pagination.
#[derive(Debug, Clone, Default)]
pub struct ReadQuery {
    /// Documents must match this filter.
    pub filter: Filter,
    /// If non-empty, returned documents keep only these top-level fields.
    pub fields: Vec<String>,
    /// Sort keys, most significant first.
    pub sort: Vec<Sort>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of matching documents to skip.
    pub skip: Option<usize>,
}

impl ReadQuery {
    /// Creates a query that returns every document.
    pub fn new() -> Self {
        ReadQuery::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> ReadQueryBuilder {
        ReadQueryBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadQueryBuilder {
    query: ReadQuery,
}

impl ReadQueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        ReadQueryBuilder::default()
    }

    /// Sets the filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.query.filter = filter;
        self
    }

    /// Sets the projected fields.
    pub fn fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.query.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a sort key.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort { field: field.into(), direction });
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.query.skip = Some(skip);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> ReadQuery {
        self.query
    }
}

/// Visitor over a [`Filter`], implemented by each backend's filter engine.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, predicates: &[FieldPredicate]) -> Result<Self::Output, Self::Error>;
    fn visit_field(&mut self, path: &str, predicate: &Predicate) -> Result<Self::Output, Self::Error>;

    fn visit_filter(&mut self, filter: &Filter) -> Result<Self::Output, Self::Error> {
        self.visit_and(filter.predicates())
    }
}
