use std::{future::Future, time::Duration};

use async_trait::async_trait;
use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};
use serde_json::Value;
use tracing::{debug, info};

use docvault_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    clock::next_stamp,
    document::{CH_TIME, CR_TIME, INTERNAL_ID, RawDocument, RawDocumentExt, TTL, new_internal_id},
    error::{DocumentStoreError, DocumentStoreResult},
    page::Page,
    query::{Filter, QueryVisitor, ReadQuery},
    update::UpdateExpr,
};

use crate::{
    convert::{MONGO_ID, from_document, to_document},
    query::{MongoQueryTranslator, sort_document, update_document},
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

fn backend_error(err: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::Backend(err.to_string())
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
    timeout: Duration,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String, timeout: Duration) -> Self {
        Self { client, database, timeout }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, mongodb::error::Error>>,
    ) -> DocumentStoreResult<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| DocumentStoreError::Timeout(self.timeout))?
            .map_err(backend_error)
    }

    /// Assigns identity and timestamps. Record expiry is not supported here, so
    /// `ttl` is only stripped.
    fn prepare_document(&self, mut document: RawDocument) -> DocumentStoreResult<(String, Document)> {
        if document.shift_remove(TTL).is_some() {
            debug!("ttl is not supported by the mongodb backend; ignoring");
        }

        let id = document
            .internal_id()
            .map(str::to_string)
            .unwrap_or_else(new_internal_id);
        let stamp = next_stamp();

        document.insert(INTERNAL_ID.to_string(), Value::String(id.clone()));
        document.insert(CR_TIME.to_string(), Value::from(stamp));
        document.insert(CH_TIME.to_string(), Value::from(stamp));

        Ok((id, to_document(&document)?))
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn create_documents(
        &self,
        collection: &str,
        documents: Vec<RawDocument>,
    ) -> DocumentStoreResult<Vec<String>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let (ids, prepared): (Vec<String>, Vec<Document>) = documents
            .into_iter()
            .map(|document| self.prepare_document(document))
            .collect::<DocumentStoreResult<Vec<_>>>()?
            .into_iter()
            .unzip();

        self.bounded(self.get_collection(collection).insert_many(prepared).into_future())
            .await?;

        Ok(ids)
    }

    async fn read_documents(
        &self,
        collection: &str,
        query: &ReadQuery,
    ) -> DocumentStoreResult<Page<RawDocument>> {
        let filter = MongoQueryTranslator.visit_filter(&query.filter)?;
        let coll = self.get_collection(collection);

        let total = self
            .bounded(coll.count_documents(filter.clone()).into_future())
            .await?;

        let mut options = FindOptions::default();

        if !query.sort.is_empty() {
            options.sort = Some(sort_document(&query.sort));
        }
        if let Some(limit) = query.limit.filter(|l| *l > 0) {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.skip.filter(|s| *s > 0) {
            options.skip = Some(skip as u64);
        }
        if !query.fields.is_empty() {
            let mut projection: Document = query
                .fields
                .iter()
                .map(|field| (field.clone(), bson::Bson::Int32(1)))
                .collect();
            projection.insert(MONGO_ID, 0);
            options.projection = Some(projection);
        }

        let documents: Vec<Document> = self
            .bounded(async {
                coll.find(filter)
                    .with_options(options)
                    .await?
                    .try_collect()
                    .await
            })
            .await?;

        Ok(Page::builder(
            documents
                .into_iter()
                .map(from_document)
                .collect::<DocumentStoreResult<Vec<_>>>()?,
        )
        .with_total(total as usize)
        .build())
    }

    async fn update_documents(
        &self,
        collection: &str,
        filter: &Filter,
        update: &UpdateExpr,
        upsert: bool,
    ) -> DocumentStoreResult<u64> {
        let filter = MongoQueryTranslator.visit_filter(filter)?;
        let new_id = upsert.then(new_internal_id);
        let update = update_document(update, next_stamp(), new_id.as_deref())?;

        let result = self
            .bounded(
                self.get_collection(collection)
                    .update_many(filter, update)
                    .upsert(upsert)
                    .into_future(),
            )
            .await?;

        Ok(match result.upserted_id {
            Some(_) => 1,
            None => result.modified_count,
        })
    }

    async fn delete_documents(&self, collection: &str, filter: &Filter) -> DocumentStoreResult<u64> {
        let filter = MongoQueryTranslator.visit_filter(filter)?;

        let result = self
            .bounded(self.get_collection(collection).delete_many(filter).into_future())
            .await?;

        Ok(result.deleted_count)
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        self.bounded(
            self.client
                .database(&self.database)
                .run_command(doc! { "ping": 1 })
                .into_future(),
        )
        .await
        .map_err(|err| DocumentStoreError::BackendUnavailable(err.to_string()))?;

        Ok(())
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;
        info!(database = %self.database, "mongodb client shut down");

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    timeout: Duration,
    max_pool_size: Option<u32>,
    min_pool_size: Option<u32>,
    max_idle_time: Option<Duration>,
    server_selection_timeout: Option<Duration>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_pool_size: None,
            min_pool_size: None,
            max_idle_time: None,
            server_selection_timeout: None,
        }
    }

    /// Sets the bound on every database call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Caps the number of pooled connections per server.
    pub fn max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    /// Keeps at least this many pooled connections per server.
    pub fn min_pool_size(mut self, size: u32) -> Self {
        self.min_pool_size = Some(size);
        self
    }

    /// Closes pooled connections idle for longer than this.
    pub fn max_idle_time(mut self, idle: Duration) -> Self {
        self.max_idle_time = Some(idle);
        self
    }

    /// Bounds how long the driver waits for a suitable server.
    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = Some(timeout);
        self
    }

    /// Parses the connection string and applies the pool settings over it.
    async fn client_options(&self) -> DocumentStoreResult<ClientOptions> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        if let Some(size) = self.max_pool_size {
            options.max_pool_size = Some(size);
        }
        if let Some(size) = self.min_pool_size {
            options.min_pool_size = Some(size);
        }
        if let Some(idle) = self.max_idle_time {
            options.max_idle_time = Some(idle);
        }
        if let Some(timeout) = self.server_selection_timeout {
            options.server_selection_timeout = Some(timeout);
        }

        Ok(options)
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let options = self.client_options().await?;

        let store = MongoDbStore::new(
            Client::with_options(options)
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
            self.timeout,
        );

        store.ping().await?;
        info!(database = %store.database, "connected to mongodb");

        Ok(store)
    }
}
