//! In-memory document storage backend for itemlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development,
//! testing, and small deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **MongoDB filter language** - Comparison, membership and logical operators over dot paths
//! - **Cursor shaping** - Sort, skip, limit and projection
//! - **Upserts** - Missing documents are seeded from the filter's equality fields
//!
//! # Quick Start
//!
//! ```ignore
//! use itemlayer::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!
//!     let mut manager = ItemManager::new(ManagerConfig::for_collection("users"));
//!     manager.init(backend, ObjectIdCaster)?;
//!
//!     manager.insert_one(doc! { "name": "Alice" }).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as itemlayer_memory;

pub mod store;
pub mod evaluator;
mod update;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
