//! MongoDB backend implementation for docvault.
//!
//! This crate passes document operations through to a MongoDB database:
//! filters and update expressions are translated into MongoDB's own syntax and
//! executed by the server. System fields (`internal_id`, `cr_time`, `ch_time`)
//! are assigned the same way as by every other backend.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docvault = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docvault::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "storage")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docvault_mongodb;

mod convert;
pub mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
