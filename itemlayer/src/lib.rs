//! Main itemlayer crate providing a CRUD and query-resolution layer over document stores.
//!
//! This crate is the primary entry point for users of itemlayer. It re-exports the core
//! types from the sub-crates and gives access to the available storage backends.
//!
//! # Features
//!
//! - **Id-aware filters** - Textual identifiers are cast to native ones and merged into filters
//! - **Auto-insert** - Reads and updates can create missing documents on the fly
//! - **Hooks** - Post-fetch validation, per-document mapping and post-delete side effects
//! - **Change notifications** - Subscribers are told about every successful update
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use itemlayer::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut manager = ItemManager::new(ManagerConfig::for_collection("users"));
//!     manager.init(InMemoryStore::builder().build().await?, ObjectIdCaster)?;
//!
//!     manager
//!         .subscribe(|event| println!("{}: {}", event.name(), event.item()))
//!         .await;
//!
//!     let id = manager.insert_one(doc! { "name": "Alice" }).await?;
//!
//!     manager
//!         .update(&UpdateOptions::new(Selector::by_id(id.clone())).set(doc! { "name": "Bob" }))
//!         .await?;
//!
//!     let name = manager
//!         .get_path(&ReadOptions::new(Selector::by_id(id)), "name")
//!         .await?;
//!     println!("name is now {name:?}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! Manager defaults can be loaded from JSON:
//!
//! ```ignore
//! let config = ManagerConfig::from_json_str(r#"{
//!     "collection": "users",
//!     "auto_insert": true,
//!     "flags": { "acknowledged": true }
//! }"#)?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use itemlayer_core::{
    backend, config, error, hooks, ident, manager, notify, options, path, resolver,
};

// Re-export BSON types and the hook trait macro for convenience
pub use bson;
pub use async_trait::async_trait;

/// In-memory storage backend implementations.
pub mod memory {
    pub use itemlayer_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use itemlayer_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
