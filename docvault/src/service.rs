//! Request/response facade over a [`DynDocumentStore`].
//!
//! Requests arrive as plain serde types, typically decoded from JSON. The
//! service validates their shape, translates them into store operations and
//! wraps the outcome in the matching response type.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use docvault_core::{
    collection::validate_collection_name,
    document::RawDocument,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Filter, ReadQuery, sort_from_raw},
    store::DynDocumentStore,
    update::UpdateExpr,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateDocumentsRequest {
    pub collection: String,
    /// Documents to store. Every entry must be a mapping.
    #[serde(default)]
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateDocumentsResponse {
    /// Identifiers of the stored documents, in input order.
    pub data: Vec<String>,
    pub created: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadDocumentsRequest {
    pub collection: String,
    /// Filter mapping; `null` or absent matches everything.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub filter: Value,
    /// Ordered `{field: 1 | -1}` mapping.
    #[serde(default, skip_serializing_if = "RawDocument::is_empty")]
    pub sort: RawDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadDocumentsResponse {
    pub data: Vec<RawDocument>,
    /// Matches before `skip` and `limit` were applied.
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateDocumentsRequest {
    pub collection: String,
    #[serde(default)]
    pub filter: Value,
    /// Update expression: operator mapping or direct field replacements.
    pub data: Value,
    #[serde(default)]
    pub upsert: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateDocumentsResponse {
    pub data: Vec<String>,
    pub updated: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteDocumentsRequest {
    pub collection: String,
    #[serde(default)]
    pub filter: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteDocumentsResponse {
    pub data: Vec<String>,
    pub deleted: u64,
}

fn into_documents(data: Vec<Value>) -> DocumentStoreResult<Vec<RawDocument>> {
    data.into_iter()
        .enumerate()
        .map(|(position, value)| match value {
            Value::Object(document) => Ok(document),
            other => Err(DocumentStoreError::validation(format!(
                "data[{position}] must be a mapping, got {other}"
            ))),
        })
        .collect()
}

/// The storage service: validated document operations over one store.
#[derive(Debug)]
pub struct StorageService {
    store: DynDocumentStore,
}

impl StorageService {
    pub fn new(store: DynDocumentStore) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &DynDocumentStore {
        &self.store
    }

    pub async fn create_documents(
        &self,
        request: CreateDocumentsRequest,
    ) -> DocumentStoreResult<CreateDocumentsResponse> {
        validate_collection_name(&request.collection)?;
        let documents = into_documents(request.data)?;

        let ids = self.store.create(&request.collection, documents).await?;
        debug!(collection = %request.collection, created = ids.len(), "create request served");

        Ok(CreateDocumentsResponse {
            created: ids.len(),
            data: ids,
        })
    }

    pub async fn read_documents(
        &self,
        request: ReadDocumentsRequest,
    ) -> DocumentStoreResult<ReadDocumentsResponse> {
        validate_collection_name(&request.collection)?;

        let query = ReadQuery {
            filter: Filter::from_value(request.filter)?,
            fields: request.fields,
            sort: sort_from_raw(&request.sort)?,
            limit: request.limit,
            skip: request.skip,
        };

        let page = self.store.read(&request.collection, &query).await?;
        debug!(
            collection = %request.collection,
            returned = page.len(),
            total = page.total,
            "read request served"
        );

        Ok(ReadDocumentsResponse {
            data: page.items,
            total: page.total,
        })
    }

    pub async fn update_documents(
        &self,
        request: UpdateDocumentsRequest,
    ) -> DocumentStoreResult<UpdateDocumentsResponse> {
        validate_collection_name(&request.collection)?;

        let filter = Filter::from_value(request.filter)?;
        let update = UpdateExpr::from_value(request.data)?;

        let updated = self
            .store
            .update(&request.collection, &filter, &update, request.upsert)
            .await?;
        debug!(collection = %request.collection, updated, "update request served");

        Ok(UpdateDocumentsResponse {
            data: Vec::new(),
            updated,
        })
    }

    pub async fn delete_documents(
        &self,
        request: DeleteDocumentsRequest,
    ) -> DocumentStoreResult<DeleteDocumentsResponse> {
        validate_collection_name(&request.collection)?;

        let filter = Filter::from_value(request.filter)?;

        let deleted = self.store.delete(&request.collection, &filter).await?;
        debug!(collection = %request.collection, deleted, "delete request served");

        Ok(DeleteDocumentsResponse {
            data: Vec::new(),
            deleted,
        })
    }

    /// Shuts down the underlying store.
    pub async fn close(self) -> DocumentStoreResult<()> {
        self.store.shutdown().await
    }
}
