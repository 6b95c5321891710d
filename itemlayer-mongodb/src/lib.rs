//! MongoDB backend implementation for itemlayer.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Filters, update documents and cursor options are passed to the driver natively.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! itemlayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Native filters** - Resolved filters run on MongoDB's query engine unchanged
//! - **Streaming reads** - `find` hands back the driver cursor as a document stream
//! - **Write flags** - Upsert and acknowledged write concern per call
//!
//! # Example
//!
//! ```ignore
//! use itemlayer::{backend::StoreBackendBuilder, mongodb::MongoDbStore, prelude::*};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!
//!     let mut manager = ItemManager::new(ManagerConfig::for_collection("users"));
//!     manager.init(store, ObjectIdCaster)?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as itemlayer_mongodb;

pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
