//! Storage configuration loaded from TOML.
//!
//! ```toml
//! [storage]
//! type = "redis"                # "redis" | "memory" | "mongo"
//!
//! [storage.redis]
//! host = "127.0.0.1"
//! port = 6379
//! password = ""
//! db = 0
//! timeout = 5                   # seconds, bounds every backend call
//! candidate_source = "index"    # "index" | "key_scan"
//!
//! [storage.mongo]
//! connection_string = "mongodb://localhost:27017"
//! database = "storage"
//! timeout = 5
//! max_pool_size = 100           # optional pool settings; unset keeps the
//! min_pool_size = 0             # driver's (or connection string's) value
//! idle_timeout = 60             # seconds
//! select_timeout = 30           # seconds
//! ```
//!
//! Every field has a default, so an empty file selects the in-memory backend.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::info;

use docvault_core::{
    backend::StoreBackendBuilder,
    error::{DocumentStoreError, DocumentStoreResult},
    store::{DocumentStore, DynDocumentStore, IntoDynDocumentStore},
};
use docvault_kv::{CandidateSource, InMemoryKv, KeyValueClient, KvDocumentStore};

/// Which backend serves the document store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Key-value emulation over a Redis server.
    Redis,
    /// Key-value emulation over an in-process map.
    #[default]
    Memory,
    /// Pass-through to MongoDB.
    Mongo,
}

/// Settings for the Redis backend. Also used for the in-memory backend's
/// timeout and candidate source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
    /// Per-call timeout in seconds.
    pub timeout: u64,
    pub candidate_source: CandidateSource,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
            timeout: 5,
            candidate_source: CandidateSource::Index,
        }
    }
}

/// Settings for the MongoDB backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub connection_string: String,
    pub database: String,
    /// Per-call timeout in seconds.
    pub timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pool_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_pool_size: Option<u32>,
    /// Seconds a pooled connection may stay idle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<u64>,
    /// Seconds to wait for a suitable server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select_timeout: Option<u64>,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            connection_string: "mongodb://localhost:27017".to_string(),
            database: "storage".to_string(),
            timeout: 5,
            max_pool_size: None,
            min_pool_size: None,
            idle_timeout: None,
            select_timeout: None,
        }
    }
}

/// The `[storage]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    #[serde(rename = "type")]
    pub backend: BackendKind,
    pub redis: RedisConfig,
    pub mongo: MongoConfig,
}

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub storage: StorageSettings,
}

impl StorageConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Config`] if the text is not valid configuration.
    pub fn from_toml(content: &str) -> DocumentStoreResult<Self> {
        toml::from_str(content)
            .map_err(|e| DocumentStoreError::Config(format!("Failed to parse config: {e}")))
    }

    /// Reads and parses configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> DocumentStoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DocumentStoreError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            DocumentStoreError::Config(msg) => {
                DocumentStoreError::Config(format!("{msg} (in '{}')", path.display()))
            }
            other => other,
        })
    }
}

async fn kv_store<C: KeyValueClient>(client: C, redis: &RedisConfig) -> DocumentStoreResult<DynDocumentStore> {
    let backend = KvDocumentStore::builder(client)
        .timeout(Duration::from_secs(redis.timeout))
        .candidate_source(redis.candidate_source)
        .build()
        .await?;

    Ok(DocumentStore::new(backend).into_dyn())
}

/// Builds the configured backend and checks that it is reachable.
///
/// # Errors
///
/// Returns [`DocumentStoreError::BackendUnavailable`] if the backend cannot be
/// reached, or [`DocumentStoreError::Config`] if the selected backend was not
/// compiled in.
pub async fn connect(config: &StorageConfig) -> DocumentStoreResult<DynDocumentStore> {
    let settings = &config.storage;

    let store = match settings.backend {
        BackendKind::Memory => kv_store(InMemoryKv::new(), &settings.redis).await?,
        #[cfg(feature = "redis")]
        BackendKind::Redis => {
            let redis = &settings.redis;
            let client = docvault_kv::RedisKv::connect(&docvault_kv::RedisOptions {
                host: redis.host.clone(),
                port: redis.port,
                password: redis.password.clone(),
                db: redis.db,
            })
            .await?;

            kv_store(client, redis).await?
        }
        #[cfg(feature = "mongodb")]
        BackendKind::Mongo => {
            let mongo = &settings.mongo;
            let mut builder = docvault_mongodb::MongoDbStore::builder(&mongo.connection_string, &mongo.database)
                .timeout(Duration::from_secs(mongo.timeout));

            if let Some(size) = mongo.max_pool_size {
                builder = builder.max_pool_size(size);
            }
            if let Some(size) = mongo.min_pool_size {
                builder = builder.min_pool_size(size);
            }
            if let Some(idle) = mongo.idle_timeout {
                builder = builder.max_idle_time(Duration::from_secs(idle));
            }
            if let Some(select) = mongo.select_timeout {
                builder = builder.server_selection_timeout(Duration::from_secs(select));
            }

            let backend = builder.build().await?;

            DocumentStore::new(backend).into_dyn()
        }
        #[allow(unreachable_patterns)]
        other => {
            return Err(DocumentStoreError::Config(format!(
                "storage type {other:?} is not available in this build"
            )));
        }
    };

    info!(backend = ?settings.backend, "document store connected");

    Ok(store)
}
