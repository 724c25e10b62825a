//! Collection handles for document store operations.
//!
//! A collection handle binds a collection name to a backend and validates every
//! request before the backend is touched.
//!
//! # Collection Types
//!
//! - [`Collection`] - Untyped collection working with [`RawDocument`]s
//! - [`TypedCollection`] - Collection for a specific [`Document`] type
//!
//! # Example
//!
//! ```ignore
//! use docvault_core::query::{Filter, ReadQuery};
//! use serde_json::json;
//!
//! let users = store.collection("users");
//! let ids = users.create(vec![json!({ "name": "Alice" }).as_object().cloned().unwrap()]).await?;
//! let alice = users.get(&ids[0]).await?;
//! ```

use std::marker::PhantomData;
use tracing::debug;

use crate::{
    backend::DynStoreBackend,
    document::{Document, DocumentExt, INTERNAL_ID, RawDocument},
    error::{DocumentStoreError, DocumentStoreResult},
    page::Page,
    query::{Filter, ReadQuery},
    update::UpdateExpr,
};

/// Rejects collection names that can never be valid.
///
/// # Errors
///
/// Returns [`DocumentStoreError::ValidationFailed`] if the name is empty or blank.
pub fn validate_collection_name(name: &str) -> DocumentStoreResult<()> {
    if name.trim().is_empty() {
        return Err(DocumentStoreError::validation("collection is required"));
    }

    Ok(())
}

/// An untyped collection with a reference to a storage backend.
#[derive(Debug)]
pub struct Collection<'a> {
    name: String,
    backend: &'a dyn DynStoreBackend,
}

impl<'a> Collection<'a> {
    pub(crate) fn new(name: String, backend: &'a dyn DynStoreBackend) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores new documents and returns their identifiers in input order.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ValidationFailed`] for an invalid collection
    /// name, or the first error that prevented a document from being stored.
    pub async fn create(&self, documents: Vec<RawDocument>) -> DocumentStoreResult<Vec<String>> {
        validate_collection_name(&self.name)?;

        let requested = documents.len();
        let ids = self
            .backend
            .create_documents(&self.name, documents)
            .await?;

        debug!(collection = %self.name, requested, created = ids.len(), "created documents");

        Ok(ids)
    }

    /// Reads the documents matching a query.
    pub async fn read(&self, query: &ReadQuery) -> DocumentStoreResult<Page<RawDocument>> {
        validate_collection_name(&self.name)?;

        let page = self
            .backend
            .read_documents(&self.name, query)
            .await?;

        debug!(collection = %self.name, returned = page.len(), total = page.total, "read documents");

        Ok(page)
    }

    /// Returns every document matching the filter, without pagination.
    pub async fn find(&self, filter: Filter) -> DocumentStoreResult<Vec<RawDocument>> {
        Ok(self
            .read(&ReadQuery::builder().filter(filter).build())
            .await?
            .items)
    }

    /// Returns the document with the given identifier, if it exists.
    pub async fn get(&self, id: &str) -> DocumentStoreResult<Option<RawDocument>> {
        Ok(self
            .find(Filter::literal(INTERNAL_ID, id))
            .await?
            .into_iter()
            .next())
    }

    /// Applies an update expression to the matching documents.
    ///
    /// Returns the number of documents modified, or `1` for an upsert that
    /// created a document.
    pub async fn update(
        &self,
        filter: &Filter,
        update: &UpdateExpr,
        upsert: bool,
    ) -> DocumentStoreResult<u64> {
        validate_collection_name(&self.name)?;

        let modified = self
            .backend
            .update_documents(&self.name, filter, update, upsert)
            .await?;

        debug!(collection = %self.name, modified, upsert, "updated documents");

        Ok(modified)
    }

    /// Deletes the matching documents and returns how many were removed.
    pub async fn delete(&self, filter: &Filter) -> DocumentStoreResult<u64> {
        validate_collection_name(&self.name)?;

        let deleted = self
            .backend
            .delete_documents(&self.name, filter)
            .await?;

        debug!(collection = %self.name, deleted, "deleted documents");

        Ok(deleted)
    }
}

/// A collection of typed documents.
#[derive(Debug)]
pub struct TypedCollection<'a, D: Document> {
    inner: Collection<'a>,
    _marker: PhantomData<D>,
}

impl<'a, D: Document> TypedCollection<'a, D> {
    pub(crate) fn new(name: String, backend: &'a dyn DynStoreBackend) -> Self {
        Self { inner: Collection::new(name, backend), _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the untyped view of this collection.
    pub fn raw(&self) -> &Collection<'a> {
        &self.inner
    }

    /// Stores new documents and returns their identifiers in input order.
    pub async fn create(&self, documents: Vec<D>) -> DocumentStoreResult<Vec<String>> {
        self.inner
            .create(
                documents
                    .iter()
                    .map(DocumentExt::to_raw)
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
            )
            .await
    }

    /// Reads the documents matching a query and converts them to `D`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`] if a stored document does
    /// not fit `D`.
    pub async fn read(&self, query: &ReadQuery) -> DocumentStoreResult<Page<D>> {
        let page = self.inner.read(query).await?;
        let total = page.total;

        Ok(Page::builder(
            page.items
                .into_iter()
                .map(D::from_raw)
                .collect::<DocumentStoreResult<Vec<D>>>()?,
        )
        .with_total(total)
        .build())
    }

    /// Returns every document matching the filter.
    pub async fn find(&self, filter: Filter) -> DocumentStoreResult<Vec<D>> {
        Ok(self
            .read(&ReadQuery::builder().filter(filter).build())
            .await?
            .items)
    }

    /// Applies an update expression to the matching documents.
    pub async fn update(
        &self,
        filter: &Filter,
        update: &UpdateExpr,
        upsert: bool,
    ) -> DocumentStoreResult<u64> {
        self.inner.update(filter, update, upsert).await
    }

    /// Deletes the matching documents.
    pub async fn delete(&self, filter: &Filter) -> DocumentStoreResult<u64> {
        self.inner.delete(filter).await
    }
}
