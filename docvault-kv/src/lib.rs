//! Document store semantics emulated on a key-value store.
//!
//! This crate implements the `StoreBackend` trait on top of primitive key-value
//! operations (get, set, delete, pattern scan and hashes), so that any store
//! offering them can serve document collections with filtering, sorting,
//! projection and pagination.
//!
//! # Features
//!
//! - **Pluggable clients** - [`KeyValueClient`] with an in-memory implementation and,
//!   behind the `redis` feature, a Redis implementation
//! - **Filter evaluation** - Comparison and set operators over dotted field paths
//! - **Update operators** - `$set`, `$unset`, `$inc` and direct replacement
//! - **Collection index** - Membership hashes with lazy repair and reconciliation
//! - **Bounded calls** - Every key-value call runs under a timeout
//!
//! # Quick Start
//!
//! ```ignore
//! use docvault_core::{backend::StoreBackendBuilder, store::DocumentStore};
//! use docvault_kv::{InMemoryKv, KvDocumentStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = KvDocumentStore::builder(InMemoryKv::new()).build().await?;
//!     let store = DocumentStore::new(backend);
//!
//!     let users = store.collection("users");
//!     users.create(vec![json!({ "name": "Alice", "age": 30 }).as_object().cloned().unwrap()]).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docvault_kv;

pub mod client;
pub mod codec;
pub mod evaluator;
pub mod index;
pub mod keys;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_kv;
pub mod store;
pub mod updater;

pub use client::{KeyValueClient, TimeoutClient};
pub use memory::InMemoryKv;
#[cfg(feature = "redis")]
pub use redis_kv::{RedisKv, RedisOptions};
pub use store::{CandidateSource, KvDocumentStore, KvDocumentStoreBuilder, ReconcileReport};
