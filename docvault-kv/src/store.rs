//! Document store emulated on a key-value client.
//!
//! Every document is one record `doc:{collection}:{id}` holding its JSON text,
//! and every collection keeps a membership hash `idx:{collection}`. Reads
//! enumerate candidate ids, load each record, and filter, sort and paginate in
//! process. Updates and deletes are read-then-write per document with no
//! locking: concurrent writers to the same document follow last-writer-wins,
//! and an update that races another may be lost. Lazy index repair has a
//! similar window: if a create reuses a caller-supplied id between a read
//! seeing the record missing and the read unregistering it, the new document
//! drops out of the index until the next update or `reconcile`.

use std::{collections::HashSet, time::Duration};

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use docvault_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::validate_collection_name,
    document::{RawDocument, TTL},
    error::{DocumentStoreError, DocumentStoreResult},
    page::Page,
    query::{Filter, ReadQuery},
    update::UpdateExpr,
};

use crate::{
    client::{KeyValueClient, TimeoutClient},
    codec,
    evaluator::{matches, project, sort_documents},
    index::CollectionIndex,
    keys::document_key,
    updater,
};

/// Default bound on every key-value call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of records loaded concurrently during enumeration.
const LOAD_CONCURRENCY: usize = 16;

/// How a read enumerates the ids of a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Members of the collection index. Stale entries are removed as they are found.
    #[default]
    Index,
    /// A pattern scan over record keys.
    KeyScan,
}

/// A record as found on the key-value store.
enum Record {
    Present(RawDocument),
    /// Absent or expired.
    Missing,
    /// Present but undecodable.
    Malformed,
}

/// Outcome of [`KvDocumentStore::reconcile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records that were missing from the index and have been registered.
    pub added: u64,
    /// Index entries without a record that have been removed.
    pub removed: u64,
}

/// Document store backed by a [`KeyValueClient`].
///
/// Cloning is cheap; clones share the client.
#[derive(Debug)]
pub struct KvDocumentStore<C> {
    client: TimeoutClient<C>,
    candidate_source: CandidateSource,
}

impl<C> Clone for KvDocumentStore<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            candidate_source: self.candidate_source,
        }
    }
}

impl<C: KeyValueClient> KvDocumentStore<C> {
    /// Creates a builder over the given client.
    pub fn builder(client: C) -> KvDocumentStoreBuilder<C> {
        KvDocumentStoreBuilder::new(client)
    }

    /// Returns the underlying key-value client.
    pub fn client(&self) -> &C {
        self.client.inner()
    }

    /// Returns how reads enumerate candidates.
    pub fn candidate_source(&self) -> CandidateSource {
        self.candidate_source
    }

    /// Rebuilds the collection index from a scan of the record keys.
    ///
    /// Records missing from the index are registered and entries without a
    /// record are removed.
    pub async fn reconcile(&self, collection: &str) -> DocumentStoreResult<ReconcileReport> {
        check_collection(collection)?;

        let index = CollectionIndex::new(&self.client, collection);
        let records: HashSet<String> = index.scan_records().await?.into_iter().collect();
        let members: HashSet<String> = index.members().await?.into_iter().collect();

        let mut report = ReconcileReport::default();

        for id in records.difference(&members) {
            index.register(id).await?;
            report.added += 1;
        }

        let stale: Vec<String> = members.difference(&records).cloned().collect();
        report.removed = index.unregister(&stale).await?;

        info!(
            collection = %collection,
            added = report.added,
            removed = report.removed,
            "reconciled collection index"
        );

        Ok(report)
    }

    async fn candidate_ids(&self, index: &CollectionIndex<'_, TimeoutClient<C>>) -> DocumentStoreResult<Vec<String>> {
        match self.candidate_source {
            CandidateSource::Index => index.members().await,
            CandidateSource::KeyScan => index.scan_records().await,
        }
    }

    async fn load(&self, collection: &str, id: &str) -> DocumentStoreResult<Record> {
        let key = document_key(collection, id);

        let raw = match self.client.get(&key).await {
            Ok(raw) => raw,
            Err(DocumentStoreError::NotFound(_)) => return Ok(Record::Missing),
            Err(err) => return Err(err),
        };

        match codec::decode(&key, &raw) {
            Ok(document) => Ok(Record::Present(document)),
            Err(err) => {
                warn!(collection = %collection, id = %id, error = %err, "skipping malformed record");
                Ok(Record::Malformed)
            }
        }
    }

    /// Returns every document of the collection matching the filter, with its id.
    async fn matching(&self, collection: &str, filter: &Filter) -> DocumentStoreResult<Vec<(String, RawDocument)>> {
        let index = CollectionIndex::new(&self.client, collection);
        let ids = self.candidate_ids(&index).await?;

        let loaded: Vec<(String, Record)> = stream::iter(ids)
            .map(|id| async move {
                let record = self.load(collection, &id).await?;
                Ok::<_, DocumentStoreError>((id, record))
            })
            .buffered(LOAD_CONCURRENCY)
            .try_collect()
            .await?;

        let mut stale = Vec::new();
        let mut found = Vec::new();

        for (id, record) in loaded {
            match record {
                Record::Present(document) => {
                    if matches(&document, filter) {
                        found.push((id, document));
                    }
                }
                Record::Missing => stale.push(id),
                Record::Malformed => {}
            }
        }

        if self.candidate_source == CandidateSource::Index && !stale.is_empty() {
            match index.unregister(&stale).await {
                Ok(removed) => debug!(collection = %collection, removed, "removed stale index entries"),
                Err(err) => warn!(collection = %collection, error = %err, "failed to remove stale index entries"),
            }
        }

        Ok(found)
    }

    /// Stores a new record and registers it. A record whose registration fails
    /// is removed again so that it does not linger outside the index.
    async fn insert(
        &self,
        collection: &str,
        mut document: RawDocument,
        ttl: Option<Duration>,
    ) -> DocumentStoreResult<String> {
        let id = codec::stamp_new(&mut document);
        let key = document_key(collection, &id);

        self.client
            .set(&key, codec::encode(&document)?, ttl)
            .await?;

        if let Err(err) = CollectionIndex::new(&self.client, collection)
            .register(&id)
            .await
        {
            if let Err(cleanup) = self.client.delete(&[key]).await {
                warn!(
                    collection = %collection,
                    id = %id,
                    error = %cleanup,
                    "failed to remove unregistered record"
                );
            }
            return Err(err);
        }

        Ok(id)
    }

    /// Overwrites an existing record. Once the record is written the update
    /// counts, even if refreshing its index entry fails.
    async fn rewrite(&self, collection: &str, id: &str, document: &RawDocument) -> DocumentStoreResult<()> {
        self.client
            .set(&document_key(collection, id), codec::encode(document)?, None)
            .await?;

        if let Err(err) = CollectionIndex::new(&self.client, collection)
            .register(id)
            .await
        {
            warn!(collection = %collection, id = %id, error = %err, "failed to refresh index entry");
        }

        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> DocumentStoreResult<bool> {
        let removed = self
            .client
            .delete(&[document_key(collection, id)])
            .await?;
        CollectionIndex::new(&self.client, collection)
            .unregister(&[id.to_string()])
            .await?;

        Ok(removed > 0)
    }
}

/// Rejects names that would make the key layout ambiguous.
fn check_collection(collection: &str) -> DocumentStoreResult<()> {
    validate_collection_name(collection)?;

    if collection.contains(':') {
        return Err(DocumentStoreError::validation(format!(
            "collection name must not contain ':', got {collection:?}"
        )));
    }

    Ok(())
}

#[async_trait]
impl<C: KeyValueClient> StoreBackend for KvDocumentStore<C> {
    async fn create_documents(
        &self,
        collection: &str,
        documents: Vec<RawDocument>,
    ) -> DocumentStoreResult<Vec<String>> {
        check_collection(collection)?;

        let mut ids = Vec::with_capacity(documents.len());

        for mut document in documents {
            let ttl = codec::take_ttl(&mut document);

            match self.insert(collection, document, ttl).await {
                Ok(id) => ids.push(id),
                Err(err) => {
                    warn!(
                        collection = %collection,
                        stored = ids.len(),
                        error = %err,
                        "create stopped; earlier documents remain stored"
                    );
                    return Err(err);
                }
            }
        }

        Ok(ids)
    }

    async fn read_documents(
        &self,
        collection: &str,
        query: &ReadQuery,
    ) -> DocumentStoreResult<Page<RawDocument>> {
        check_collection(collection)?;

        let mut documents: Vec<RawDocument> = self
            .matching(collection, &query.filter)
            .await?
            .into_iter()
            .map(|(_, document)| document)
            .collect();

        sort_documents(&mut documents, &query.sort);

        let projected = documents
            .into_iter()
            .map(|document| project(document, &query.fields))
            .collect();

        Ok(Page::paginate(projected, query.skip, query.limit))
    }

    async fn update_documents(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateExpr,
        upsert: bool,
    ) -> DocumentStoreResult<u64> {
        check_collection(collection)?;

        let matched = self.matching(collection, filter).await?;

        if matched.is_empty() {
            if !upsert {
                return Ok(0);
            }

            let mut document = RawDocument::new();
            updater::apply(&mut document, update);
            // Expiry is a create-only option.
            document.shift_remove(TTL);

            let id = self.insert(collection, document, None).await?;
            debug!(collection = %collection, id = %id, "upserted document");

            return Ok(1);
        }

        let mut modified = 0;

        for (id, mut document) in matched {
            updater::apply(&mut document, update);
            codec::touch(&mut document);

            match self.rewrite(collection, &id, &document).await {
                Ok(()) => modified += 1,
                Err(err) => warn!(collection = %collection, id = %id, error = %err, "skipping document update"),
            }
        }

        Ok(modified)
    }

    async fn delete_documents(&self, collection: &str, filter: &Filter) -> DocumentStoreResult<u64> {
        check_collection(collection)?;

        let mut deleted = 0;

        for (id, _) in self.matching(collection, filter).await? {
            match self.remove(collection, &id).await {
                Ok(true) => deleted += 1,
                Ok(false) => debug!(collection = %collection, id = %id, "document already removed"),
                Err(err) => warn!(collection = %collection, id = %id, error = %err, "skipping document delete"),
            }
        }

        Ok(deleted)
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        self.client.ping().await
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.close().await?;
        info!("key-value document store closed");

        Ok(())
    }
}

/// Builder for [`KvDocumentStore`].
///
/// `build` pings the client and fails with
/// [`DocumentStoreError::BackendUnavailable`] if it is unreachable.
///
/// # Example
///
/// ```ignore
/// use docvault_kv::{InMemoryKv, KvDocumentStore};
/// use docvault_core::backend::StoreBackendBuilder;
///
/// let store = KvDocumentStore::builder(InMemoryKv::new())
///     .timeout(Duration::from_secs(2))
///     .build()
///     .await?;
/// ```
#[derive(Debug)]
pub struct KvDocumentStoreBuilder<C> {
    client: C,
    timeout: Duration,
    candidate_source: CandidateSource,
}

impl<C: KeyValueClient> KvDocumentStoreBuilder<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            candidate_source: CandidateSource::default(),
        }
    }

    /// Sets the bound on every key-value call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how reads enumerate candidates.
    pub fn candidate_source(mut self, candidate_source: CandidateSource) -> Self {
        self.candidate_source = candidate_source;
        self
    }
}

#[async_trait]
impl<C: KeyValueClient> StoreBackendBuilder for KvDocumentStoreBuilder<C> {
    type Backend = KvDocumentStore<C>;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let store = KvDocumentStore {
            client: TimeoutClient::new(self.client, self.timeout),
            candidate_source: self.candidate_source,
        };

        store.client.ping().await.map_err(|err| match err {
            DocumentStoreError::BackendUnavailable(_) => err,
            other => DocumentStoreError::BackendUnavailable(other.to_string()),
        })?;

        debug!(
            timeout = ?self.timeout,
            candidate_source = ?self.candidate_source,
            "key-value document store ready"
        );

        Ok(store)
    }
}
