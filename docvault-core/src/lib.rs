//! A unified document storage interface over heterogeneous backends.
//!
//! This crate is the core of the docvault project and provides:
//!
//! - **Document model** ([`document`]) - Untyped documents, system fields and typed document traits
//! - **Store backend abstraction** ([`backend`]) - The operation contract every backend implements
//! - **Query and filtering API** ([`query`]) - Filters, sort keys and read queries
//! - **Update expressions** ([`update`]) - `$set`, `$unset`, `$inc` and direct replacement
//! - **Collections interface** ([`collection`]) - Validated handles for one collection
//! - **Document store** ([`store`]) - Main interface for working with typed or untyped documents
//! - **Timestamps** ([`clock`]) - Process-wide monotonic `cr_time` / `ch_time` stamps
//! - **Pagination** ([`page`]) - Result pages carrying the pre-pagination total
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use docvault_core::{document::Document, store::DocumentStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     pub internal_id: Option<String>,
//!     pub name: String,
//! }
//!
//! impl Document for User {
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//! }
//!
//! let store = DocumentStore::new(backend);
//! store.typed_collection::<User>().create(vec![user]).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docvault_core;

pub mod backend;
pub mod clock;
pub mod collection;
pub mod document;
pub mod error;
pub mod page;
pub mod query;
pub mod store;
pub mod update;
