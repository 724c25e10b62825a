//! Redis key-value client.
//!
//! Uses a multiplexed [`ConnectionManager`] that reconnects on failure; every
//! call clones the manager handle, so the client can be shared freely.

use std::{collections::HashMap, fmt, time::Duration};

use async_trait::async_trait;
use redis::{Client, RedisError, aio::ConnectionManager};
use tracing::info;

use docvault_core::error::{DocumentStoreError, DocumentStoreResult};

use crate::client::KeyValueClient;

const SCAN_BATCH: usize = 100;

/// Connection settings for a Redis server.
#[derive(Debug, Clone, PartialEq)]
pub struct RedisOptions {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
        }
    }
}

impl RedisOptions {
    /// Builds the `redis://` connection URL.
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.password, self.host, self.port, self.db)
        }
    }
}

/// [`KeyValueClient`] over a Redis server.
#[derive(Clone)]
pub struct RedisKv {
    manager: ConnectionManager,
    address: String,
}

impl fmt::Debug for RedisKv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisKv")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl RedisKv {
    /// Connects to the server described by `options`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::BackendUnavailable`] if the URL is invalid
    /// or the server cannot be reached.
    pub async fn connect(options: &RedisOptions) -> DocumentStoreResult<Self> {
        let address = format!("{}:{}/{}", options.host, options.port, options.db);

        let client = Client::open(options.url())
            .map_err(|err| DocumentStoreError::BackendUnavailable(err.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| DocumentStoreError::BackendUnavailable(err.to_string()))?;

        info!(address = %address, "connected to redis");

        Ok(Self { manager, address })
    }
}

fn backend_error(err: RedisError) -> DocumentStoreError {
    if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        DocumentStoreError::BackendUnavailable(err.to_string())
    } else {
        DocumentStoreError::Backend(err.to_string())
    }
}

#[async_trait]
impl KeyValueClient for RedisKv {
    async fn get(&self, key: &str) -> DocumentStoreResult<String> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;

        value.ok_or_else(|| DocumentStoreError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> DocumentStoreResult<()> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);

        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }

        let _: () = cmd
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> DocumentStoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.manager.clone();

        redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(backend_error)
    }

    async fn scan(&self, pattern: &str) -> DocumentStoreResult<Vec<String>> {
        let mut conn = self.manager.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(backend_error)?;

            keys.extend(batch);

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys)
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> DocumentStoreResult<()> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> DocumentStoreResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }

        let mut conn = self.manager.clone();

        redis::cmd("HDEL")
            .arg(key)
            .arg(fields)
            .query_async(&mut conn)
            .await
            .map_err(backend_error)
    }

    async fn hgetall(&self, key: &str) -> DocumentStoreResult<HashMap<String, String>> {
        let mut conn = self.manager.clone();

        redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(backend_error)
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|err| DocumentStoreError::BackendUnavailable(err.to_string()))?;

        Ok(())
    }

    async fn close(&self) -> DocumentStoreResult<()> {
        info!(address = %self.address, "closing redis connection");

        Ok(())
    }
}
