//! Conversion between JSON documents and BSON.

use bson::{Bson, Document, de::deserialize_from_bson, error::Error as BsonError, ser::serialize_to_bson};
use serde_json::Value;

use docvault_core::{
    document::RawDocument,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// MongoDB's primary key, never exposed to callers.
pub(crate) const MONGO_ID: &str = "_id";

pub(crate) fn bson_error(err: BsonError) -> DocumentStoreError {
    DocumentStoreError::Serialization(err.to_string())
}

pub(crate) fn to_bson(value: &Value) -> DocumentStoreResult<Bson> {
    serialize_to_bson(value).map_err(bson_error)
}

pub(crate) fn to_document(raw: &RawDocument) -> DocumentStoreResult<Document> {
    match serialize_to_bson(raw).map_err(bson_error)? {
        Bson::Document(document) => Ok(document),
        other => Err(DocumentStoreError::Serialization(format!(
            "expected a BSON document, got {other}"
        ))),
    }
}

/// Converts a stored document back, dropping `_id`.
pub(crate) fn from_document(mut document: Document) -> DocumentStoreResult<RawDocument> {
    document.remove(MONGO_ID);

    deserialize_from_bson(Bson::Document(document)).map_err(bson_error)
}
