//! Convenient re-exports of commonly used types from docvault.
//!
//! ```ignore
//! use docvault::prelude::*;
//! ```

pub use docvault_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    collection::{Collection, TypedCollection},
    document::{Document, DocumentExt, RawDocument, RawDocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    page::Page,
    query::{Filter, QueryVisitor, ReadQuery, Sort, SortDirection},
    store::{DocumentStore, DynDocumentStore, IntoDynDocumentStore, IntoStaticDocumentStore},
    update::UpdateExpr,
};

pub use crate::service::StorageService;
