//! Core types for document representation and serialization.
//!
//! Documents are untyped, ordered field mappings ([`RawDocument`]). Three system
//! fields are reserved and managed exclusively by the store: [`INTERNAL_ID`],
//! [`CR_TIME`] and [`CH_TIME`]. Typed documents can be layered on top through the
//! [`Document`] trait, which converts to and from the raw representation with serde.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, from_value, to_value};
use uuid::Uuid;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Globally unique document identifier, assigned at creation and immutable afterwards.
pub const INTERNAL_ID: &str = "internal_id";
/// Creation timestamp in nanoseconds since the Unix epoch.
pub const CR_TIME: &str = "cr_time";
/// Last-modification timestamp in nanoseconds since the Unix epoch.
pub const CH_TIME: &str = "ch_time";
/// Creation-only expiry hint in seconds. Never persisted as a field.
pub const TTL: &str = "ttl";

/// The fields injected by the store.
pub const SYSTEM_FIELDS: [&str; 3] = [INTERNAL_ID, CR_TIME, CH_TIME];

/// An untyped document: an ordered mapping from field name to a dynamically typed value.
pub type RawDocument = Map<String, Value>;

/// Generates a new random document identifier.
pub fn new_internal_id() -> String {
    Uuid::new_v4().to_string()
}

/// Returns `true` for the fields no update operator may touch.
pub fn is_protected_field(field: &str) -> bool {
    field == INTERNAL_ID || field == CR_TIME
}

/// Convenience accessors over [`RawDocument`].
pub trait RawDocumentExt {
    /// Returns the document's identifier if it is a non-empty string.
    fn internal_id(&self) -> Option<&str>;

    /// Resolves a dot-separated path through nested mappings.
    ///
    /// Returns `None` if any intermediate segment is missing or is not a mapping.
    fn get_path(&self, path: &str) -> Option<&Value>;

    /// Returns a copy of the document without the store-managed fields.
    fn without_system_fields(&self) -> RawDocument;
}

impl RawDocumentExt for RawDocument {
    fn internal_id(&self) -> Option<&str> {
        self.get(INTERNAL_ID)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;

        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }

        Some(current)
    }

    fn without_system_fields(&self) -> RawDocument {
        self.iter()
            .filter(|(k, _)| !SYSTEM_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Trait for typed documents stored in a collection.
///
/// # Example
///
/// ```ignore
/// use docvault_core::document::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     #[serde(skip_serializing_if = "Option::is_none")]
///     pub internal_id: Option<String>,
///     pub name: String,
/// }
///
/// impl Document for User {
///     fn collection_name() -> &'static str {
///         "users"
///     }
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;
}

/// Conversion between typed documents and [`RawDocument`].
///
/// Automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document into its raw mapping form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or does not produce a mapping.
    fn to_raw(&self) -> DocumentStoreResult<RawDocument>;

    /// Creates a document from its raw mapping form.
    ///
    /// Unknown fields (including system fields the type does not declare) are
    /// handled according to the type's serde configuration.
    fn from_raw(raw: RawDocument) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_raw(&self) -> DocumentStoreResult<RawDocument> {
        match to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(DocumentStoreError::Serialization(format!(
                "expected document to serialize to a mapping, got {other}"
            ))),
        }
    }

    fn from_raw(raw: RawDocument) -> DocumentStoreResult<Self> {
        Ok(from_value(Value::Object(raw))?)
    }
}
