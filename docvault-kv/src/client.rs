//! Primitive key-value operations the document emulation is built on.
//!
//! A [`KeyValueClient`] knows nothing about documents: it stores opaque string
//! values under string keys, enumerates keys by glob pattern and maintains
//! string-to-string hashes. [`TimeoutClient`] wraps any client so that every
//! call is bounded by a deadline.

use std::{collections::HashMap, fmt::Debug, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use docvault_core::error::{DocumentStoreError, DocumentStoreResult};

/// A key-value store with string values, glob scans and hashes.
///
/// Implementations must be safe to share between tasks; the document store
/// issues calls concurrently and never holds locks across them.
#[async_trait]
pub trait KeyValueClient: Send + Sync + Debug + 'static {
    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] if the key is absent or expired.
    async fn get(&self, key: &str) -> DocumentStoreResult<String>;

    /// Stores `value` under `key`, replacing any previous value and expiry.
    ///
    /// With `ttl` set the key expires after that duration; otherwise it never does.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> DocumentStoreResult<()>;

    /// Removes the given keys and returns how many existed.
    async fn delete(&self, keys: &[String]) -> DocumentStoreResult<u64>;

    /// Returns every live key matching a glob `pattern`.
    ///
    /// `*` matches any run of characters, `?` a single character and `\` escapes
    /// the next character.
    async fn scan(&self, pattern: &str) -> DocumentStoreResult<Vec<String>>;

    /// Sets one field of the hash stored under `key`, creating the hash if needed.
    async fn hset(&self, key: &str, field: &str, value: String) -> DocumentStoreResult<()>;

    /// Removes fields from the hash stored under `key` and returns how many existed.
    async fn hdel(&self, key: &str, fields: &[String]) -> DocumentStoreResult<u64>;

    /// Returns every field of the hash stored under `key`; empty if absent.
    async fn hgetall(&self, key: &str) -> DocumentStoreResult<HashMap<String, String>>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> DocumentStoreResult<()>;

    /// Releases connections held by the client.
    async fn close(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

/// Bounds every call of the wrapped client by a fixed timeout.
///
/// A call that does not finish in time is dropped and reported as
/// [`DocumentStoreError::Timeout`].
#[derive(Debug)]
pub struct TimeoutClient<C> {
    inner: Arc<C>,
    timeout: Duration,
}

impl<C> Clone for TimeoutClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            timeout: self.timeout,
        }
    }
}

impl<C: KeyValueClient> TimeoutClient<C> {
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }

    /// Returns the wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Returns the per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = DocumentStoreResult<T>>,
    ) -> DocumentStoreResult<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| DocumentStoreError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl<C: KeyValueClient> KeyValueClient for TimeoutClient<C> {
    async fn get(&self, key: &str) -> DocumentStoreResult<String> {
        self.bounded(self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> DocumentStoreResult<()> {
        self.bounded(self.inner.set(key, value, ttl)).await
    }

    async fn delete(&self, keys: &[String]) -> DocumentStoreResult<u64> {
        self.bounded(self.inner.delete(keys)).await
    }

    async fn scan(&self, pattern: &str) -> DocumentStoreResult<Vec<String>> {
        self.bounded(self.inner.scan(pattern)).await
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> DocumentStoreResult<()> {
        self.bounded(self.inner.hset(key, field, value)).await
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> DocumentStoreResult<u64> {
        self.bounded(self.inner.hdel(key, fields)).await
    }

    async fn hgetall(&self, key: &str) -> DocumentStoreResult<HashMap<String, String>> {
        self.bounded(self.inner.hgetall(key)).await
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        self.bounded(self.inner.ping()).await
    }

    async fn close(&self) -> DocumentStoreResult<()> {
        self.bounded(self.inner.close()).await
    }
}
