//! Per-collection membership index.
//!
//! Each collection keeps a hash `idx:{collection}` mapping every stored
//! document id to the unix second it was last written. The hash is advisory:
//! records can expire underneath it, so readers treat an entry without a record
//! as stale and remove it.

use std::collections::HashSet;

use docvault_core::{clock::unix_seconds, error::DocumentStoreResult};

use crate::{
    client::KeyValueClient,
    keys::{document_pattern, id_from_key, index_key},
};

/// Membership index of one collection.
#[derive(Debug)]
pub struct CollectionIndex<'a, C> {
    client: &'a C,
    collection: &'a str,
    key: String,
}

impl<'a, C: KeyValueClient> CollectionIndex<'a, C> {
    pub fn new(client: &'a C, collection: &'a str) -> Self {
        Self {
            client,
            collection,
            key: index_key(collection),
        }
    }

    /// Records `id` as a member, stamping the current time.
    pub async fn register(&self, id: &str) -> DocumentStoreResult<()> {
        self.client
            .hset(&self.key, id, unix_seconds().to_string())
            .await
    }

    /// Removes the given ids; absent ids are ignored.
    pub async fn unregister(&self, ids: &[String]) -> DocumentStoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        self.client.hdel(&self.key, ids).await
    }

    /// Returns the registered ids in ascending order.
    pub async fn members(&self) -> DocumentStoreResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .client
            .hgetall(&self.key)
            .await?
            .into_keys()
            .collect();
        ids.sort();

        Ok(ids)
    }

    /// Returns the ids of every live record by scanning record keys, in ascending order.
    pub async fn scan_records(&self) -> DocumentStoreResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .client
            .scan(&document_pattern(self.collection))
            .await?
            .iter()
            .filter_map(|key| id_from_key(self.collection, key))
            .map(str::to_string)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        ids.sort();

        Ok(ids)
    }
}
