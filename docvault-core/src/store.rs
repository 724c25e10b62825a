//! Main document store interface.
//!
//! - [`DocumentStore`] - Store bound to a concrete backend type
//! - [`DynDocumentStore`] - Store over a boxed backend, chosen at runtime
//!
//! Both expose the public operation contract (`create`, `read`, `update`,
//! `delete`) keyed by collection name, plus collection handles.
//!
//! # Example
//!
//! ```ignore
//! use docvault_core::{store::DocumentStore, query::{Filter, ReadQuery}};
//!
//! let store = DocumentStore::new(backend);
//! let ids = store.create("users", vec![alice]).await?;
//! let page = store.read("users", &ReadQuery::builder().filter(Filter::gt("age", 25)).build()).await?;
//! store.shutdown().await?;
//! ```

use tracing::info;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::{Collection, TypedCollection},
    document::{Document, RawDocument},
    error::DocumentStoreResult,
    page::Page,
    query::{Filter, ReadQuery},
    update::UpdateExpr,
};

/// A document store bound to a specific backend implementation.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend + 'static> {
    backend: B,
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets an untyped collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// Gets a typed collection for the specified document type.
    pub fn typed_collection<'a, D: Document>(&'a self) -> TypedCollection<'a, D> {
        TypedCollection::new(D::collection_name().to_string(), &self.backend)
    }

    /// Stores new documents in a collection.
    pub async fn create(
        &self,
        collection: &str,
        documents: Vec<RawDocument>,
    ) -> DocumentStoreResult<Vec<String>> {
        self.collection(collection).create(documents).await
    }

    /// Reads the documents of a collection matching a query.
    pub async fn read(
        &self,
        collection: &str,
        query: &ReadQuery,
    ) -> DocumentStoreResult<Page<RawDocument>> {
        self.collection(collection).read(query).await
    }

    /// Updates the documents of a collection matching a filter.
    pub async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateExpr,
        upsert: bool,
    ) -> DocumentStoreResult<u64> {
        self.collection(collection)
            .update(filter, update, upsert)
            .await
    }

    /// Deletes the documents of a collection matching a filter.
    pub async fn delete(&self, collection: &str, filter: &Filter) -> DocumentStoreResult<u64> {
        self.collection(collection).delete(filter).await
    }

    /// Checks that the backend is reachable.
    pub async fn ping(&self) -> DocumentStoreResult<()> {
        self.backend.ping().await
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;
        info!("document store shut down");

        Ok(())
    }
}

/// A document store over a backend selected at runtime.
#[derive(Debug)]
pub struct DynDocumentStore {
    backend: Box<dyn DynStoreBackend>,
}

impl DynDocumentStore {
    /// Creates a new dynamic document store with the given backend trait object.
    pub fn new(backend: Box<dyn DynStoreBackend>) -> Self {
        Self { backend }
    }

    /// Gets an untyped collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a> {
        Collection::new(name.to_string(), &*self.backend)
    }

    /// Gets a typed collection for the specified document type.
    pub fn typed_collection<'a, D: Document>(&'a self) -> TypedCollection<'a, D> {
        TypedCollection::new(D::collection_name().to_string(), &*self.backend)
    }

    /// Stores new documents in a collection.
    pub async fn create(
        &self,
        collection: &str,
        documents: Vec<RawDocument>,
    ) -> DocumentStoreResult<Vec<String>> {
        self.collection(collection).create(documents).await
    }

    /// Reads the documents of a collection matching a query.
    pub async fn read(
        &self,
        collection: &str,
        query: &ReadQuery,
    ) -> DocumentStoreResult<Page<RawDocument>> {
        self.collection(collection).read(query).await
    }

    /// Updates the documents of a collection matching a filter.
    pub async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateExpr,
        upsert: bool,
    ) -> DocumentStoreResult<u64> {
        self.collection(collection)
            .update(filter, update, upsert)
            .await
    }

    /// Deletes the documents of a collection matching a filter.
    pub async fn delete(&self, collection: &str, filter: &Filter) -> DocumentStoreResult<u64> {
        self.collection(collection).delete(filter).await
    }

    /// Checks that the backend is reachable.
    pub async fn ping(&self) -> DocumentStoreResult<()> {
        self.backend.ping().await
    }

    /// Returns the backend as `B` if that is its concrete type.
    pub fn downcast_backend<B: StoreBackend + 'static>(&self) -> Option<&B> {
        self.backend.as_any().downcast_ref::<B>()
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown_boxed().await?;
        info!("document store shut down");

        Ok(())
    }
}

/// Conversion into a [`DynDocumentStore`] for runtime polymorphism.
pub trait IntoDynDocumentStore {
    /// Converts this store into a dynamic owned store.
    fn into_dyn(self) -> DynDocumentStore;
}

impl<B: StoreBackend + 'static> IntoDynDocumentStore for DocumentStore<B> {
    fn into_dyn(self) -> DynDocumentStore {
        DynDocumentStore::new(Box::new(self.backend))
    }
}

impl IntoDynDocumentStore for DynDocumentStore {
    fn into_dyn(self) -> DynDocumentStore {
        self
    }
}

/// Recovers a statically typed store from a [`DynDocumentStore`].
pub trait IntoStaticDocumentStore {
    fn into_static<B>(self) -> Option<DocumentStore<B>>
    where
        B: StoreBackend + 'static;
}

impl IntoStaticDocumentStore for DynDocumentStore {
    fn into_static<B>(self) -> Option<DocumentStore<B>>
    where
        B: StoreBackend + 'static,
    {
        self.backend
            .into_any()
            .downcast::<B>()
            .ok()
            .map(|b| DocumentStore::new(*b))
    }
}
