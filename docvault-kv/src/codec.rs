//! Document encoding and system-field management for stored records.
//!
//! Records are stored as UTF-8 JSON text of the full document, system fields
//! included.

use std::time::Duration;

use serde_json::Value;

use docvault_core::{
    clock::next_stamp,
    document::{CH_TIME, CR_TIME, INTERNAL_ID, RawDocument, RawDocumentExt, TTL, new_internal_id},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Serializes a document into its stored form.
pub fn encode(document: &RawDocument) -> DocumentStoreResult<String> {
    Ok(serde_json::to_string(document)?)
}

/// Parses a stored record.
///
/// # Errors
///
/// Returns [`DocumentStoreError::Malformed`] if the record is not a JSON mapping.
pub fn decode(key: &str, raw: &str) -> DocumentStoreResult<RawDocument> {
    serde_json::from_str(raw).map_err(|err| DocumentStoreError::Malformed(key.to_string(), err.to_string()))
}

/// Removes the `ttl` field and returns the expiry it requests.
///
/// Only positive numeric values request an expiry; fractional seconds are truncated.
pub fn take_ttl(document: &mut RawDocument) -> Option<Duration> {
    let seconds = document.shift_remove(TTL)?.as_f64()?;

    (seconds >= 1.0).then(|| Duration::from_secs(seconds as u64))
}

/// Prepares a new document for storage and returns its identifier.
///
/// A non-empty string `internal_id` is kept, otherwise a fresh one is assigned.
/// `cr_time` and `ch_time` are both set to a new monotonic stamp.
pub fn stamp_new(document: &mut RawDocument) -> String {
    let id = document
        .internal_id()
        .map(str::to_string)
        .unwrap_or_else(new_internal_id);
    let stamp = next_stamp();

    document.insert(INTERNAL_ID.to_string(), Value::String(id.clone()));
    document.insert(CR_TIME.to_string(), Value::from(stamp));
    document.insert(CH_TIME.to_string(), Value::from(stamp));

    id
}

/// Bumps `ch_time` after a modification.
pub fn touch(document: &mut RawDocument) {
    document.insert(CH_TIME.to_string(), Value::from(next_stamp()));
}
