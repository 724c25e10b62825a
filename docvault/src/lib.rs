//! Main docvault crate providing a unified interface for document storage.
//!
//! This crate is the primary entry point for users of docvault. It re-exports
//! the core types from the sub-crates, selects a backend from configuration and
//! exposes the request/response [`service`] layer.
//!
//! # Features
//!
//! - **Untyped or typed documents** - Store ordered JSON mappings, or your own Serde types
//! - **Multiple backends** - In-memory and Redis key-value emulation, MongoDB pass-through
//! - **MongoDB-style filters and updates** - `$gt`, `$in`, `$set`, `$inc` and friends
//! - **Configuration** - Backend selection from a TOML file
//!
//! # Quick Start
//!
//! ```ignore
//! use docvault::{config::StorageConfig, prelude::*};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = docvault::connect(&StorageConfig::default()).await?;
//!
//!     let users = store.collection("users");
//!     users
//!         .create(vec![json!({ "name": "Alice", "age": 30 }).as_object().cloned().unwrap()])
//!         .await?;
//!
//!     let page = users
//!         .read(
//!             &ReadQuery::builder()
//!                 .filter(Filter::gte("age", 18))
//!                 .sort("name", SortDirection::Asc)
//!                 .build(),
//!         )
//!         .await?;
//!
//!     println!("{} of {} users", page.len(), page.total);
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`kv`] - Key-value emulation over an in-memory map or Redis (requires `redis` feature)
//! - [`mongodb`] - MongoDB pass-through (requires `mongodb` feature)

pub mod config;
pub mod prelude;
pub mod service;

pub use config::connect;
pub use docvault_core::{backend, clock, collection, document, error, page, query, store, update};

/// Key-value storage backend implementations.
pub mod kv {
    pub use docvault_kv::{
        CandidateSource, InMemoryKv, KeyValueClient, KvDocumentStore, KvDocumentStoreBuilder,
        ReconcileReport, TimeoutClient,
    };

    #[cfg(feature = "redis")]
    pub use docvault_kv::{RedisKv, RedisOptions};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docvault_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
