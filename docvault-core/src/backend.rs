//! Storage backend abstraction for the document store.
//!
//! The [`StoreBackend`] trait is the public operation contract every backend
//! implements: create, read, update and delete over named collections. Backends
//! are free to emulate document semantics (the key-value backend) or to pass
//! requests through to a native document database.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docvault_core::{backend::StoreBackend, query::{Filter, ReadQuery}};
//! use serde_json::json;
//!
//! let ids = backend
//!     .create_documents("users", vec![json!({ "name": "Alice" }).as_object().cloned().unwrap()])
//!     .await?;
//! let page = backend
//!     .read_documents("users", &ReadQuery::builder().filter(Filter::literal("name", "Alice")).build())
//!     .await?;
//! ```

use async_trait::async_trait;
use std::{any::Any, fmt::Debug};

use crate::{
    document::RawDocument,
    error::DocumentStoreResult,
    page::Page,
    query::{Filter, ReadQuery},
    update::UpdateExpr,
};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` and tolerate arbitrarily many concurrent
/// callers. No backend is required to make a read-then-write sequence atomic:
/// concurrent updates to the same document follow last-writer-wins semantics.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Per-document failures inside a batch are skipped and omitted from the result;
/// only failures that prevent the call as a whole are returned as errors.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Stores new documents, assigning `internal_id`, `cr_time` and `ch_time`.
    ///
    /// # Arguments
    ///
    /// * `collection` - The collection to write into. Created implicitly.
    /// * `documents` - The documents to store. A caller-supplied non-empty
    ///   `internal_id` is kept; a numeric `ttl` sets the record's expiry.
    ///
    /// # Returns
    ///
    /// The assigned identifiers, in input order.
    async fn create_documents(
        &self,
        collection: &str,
        documents: Vec<RawDocument>,
    ) -> DocumentStoreResult<Vec<String>>;

    /// Reads the documents matching a query.
    ///
    /// # Returns
    ///
    /// A [`Page`] whose `total` counts matches before pagination.
    async fn read_documents(
        &self,
        collection: &str,
        query: &ReadQuery,
    ) -> DocumentStoreResult<Page<RawDocument>>;

    /// Applies an update expression to every document matching the filter.
    ///
    /// If nothing matches and `upsert` is set, a new document is created from
    /// the update expression applied to an empty document.
    ///
    /// # Returns
    ///
    /// The number of documents modified (or created, for an upsert).
    async fn update_documents(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateExpr,
        upsert: bool,
    ) -> DocumentStoreResult<u64>;

    /// Deletes every document matching the filter.
    ///
    /// # Returns
    ///
    /// The number of documents removed. Matching nothing is not an error.
    async fn delete_documents(&self, collection: &str, filter: &Filter) -> DocumentStoreResult<u64>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> DocumentStoreResult<()> {
        Ok(())
    }

    /// Cleanly shuts down the backend, releasing all resources.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn create_documents(
        &self,
        collection: &str,
        documents: Vec<RawDocument>,
    ) -> DocumentStoreResult<Vec<String>> {
        (*self)
            .create_documents(collection, documents)
            .await
    }

    async fn read_documents(
        &self,
        collection: &str,
        query: &ReadQuery,
    ) -> DocumentStoreResult<Page<RawDocument>> {
        (*self)
            .read_documents(collection, query)
            .await
    }

    async fn update_documents(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateExpr,
        upsert: bool,
    ) -> DocumentStoreResult<u64> {
        (*self)
            .update_documents(collection, filter, update, upsert)
            .await
    }

    async fn delete_documents(&self, collection: &str, filter: &Filter) -> DocumentStoreResult<u64> {
        (*self)
            .delete_documents(collection, filter)
            .await
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        (*self).ping().await
    }
}

#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn create_documents(
        &self,
        collection: &str,
        documents: Vec<RawDocument>,
    ) -> DocumentStoreResult<Vec<String>>;
    async fn read_documents(
        &self,
        collection: &str,
        query: &ReadQuery,
    ) -> DocumentStoreResult<Page<RawDocument>>;
    async fn update_documents(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateExpr,
        upsert: bool,
    ) -> DocumentStoreResult<u64>;
    async fn delete_documents(&self, collection: &str, filter: &Filter) -> DocumentStoreResult<u64>;
    async fn ping(&self) -> DocumentStoreResult<()>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn create_documents(
        &self,
        collection: &str,
        documents: Vec<RawDocument>,
    ) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::create_documents(self, collection, documents).await
    }

    async fn read_documents(
        &self,
        collection: &str,
        query: &ReadQuery,
    ) -> DocumentStoreResult<Page<RawDocument>> {
        StoreBackend::read_documents(self, collection, query).await
    }

    async fn update_documents(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateExpr,
        upsert: bool,
    ) -> DocumentStoreResult<u64> {
        StoreBackend::update_documents(self, collection, filter, update, upsert).await
    }

    async fn delete_documents(&self, collection: &str, filter: &Filter) -> DocumentStoreResult<u64> {
        StoreBackend::delete_documents(self, collection, filter).await
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        StoreBackend::ping(self).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
