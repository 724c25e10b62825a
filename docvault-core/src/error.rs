//! Error types and result types for document store operations.
//!
//! Every fallible operation in the workspace returns [`DocumentStoreResult<T>`].
//! Per-document failures inside a multi-document call are not represented here:
//! they are logged and omitted from the call's result instead.

use std::time::Duration;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The backend could not be reached (connect or ping failure).
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
    /// A key was absent on a direct lookup.
    ///
    /// Reads translate this into an empty result; it is never surfaced from a read.
    #[error("Not found: {0}")]
    NotFound(String),
    /// A stored record could not be decoded into a document.
    #[error("Malformed record {0}: {1}")]
    Malformed(String, String),
    /// The request was rejected before any backend I/O took place.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    /// A backend call did not complete within the configured timeout.
    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// Serialization/deserialization error when converting between document formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DocumentStoreError {
    /// Shorthand for building a [`DocumentStoreError::ValidationFailed`].
    pub fn validation(message: impl Into<String>) -> Self {
        DocumentStoreError::ValidationFailed(message.into())
    }

    /// Returns `true` if the error was raised before the backend was touched.
    pub fn is_validation(&self) -> bool {
        matches!(self, DocumentStoreError::ValidationFailed(_))
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
