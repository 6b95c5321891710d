//! A CRUD and query-resolution layer in front of document stores.
//!
//! This crate is the core of the itemlayer project and provides:
//!
//! - **Item manager** ([`manager`]) - Resolves call options into store operations with
//!   auto-insert, upsert, validation and change notification policies
//! - **Call options** ([`options`]) - Explicit per-operation option structs
//! - **Filter resolution** ([`resolver`]) - Merges ids into base filters
//! - **Identifier casting** ([`ident`]) - Converts textual ids to native store ids
//! - **Field paths** ([`path`]) - Literal dot-path walking over documents
//! - **Store backend abstraction** ([`backend`]) - The operation contract backends implement
//! - **Change notifications** ([`notify`]) - Per-manager subscribe/publish channel
//! - **Hooks** ([`hooks`]) - Validation, pre-delete and data mapping hooks
//! - **Configuration** ([`config`]) - Instance defaults
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use itemlayer::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! let mut manager = ItemManager::new(ManagerConfig::for_collection("users"));
//! manager.init(InMemoryStore::new(), ObjectIdCaster)?;
//!
//! manager.subscribe(|event| println!("{}: {}", event.name(), event.item())).await;
//!
//! let id = manager.insert_one(doc! { "name": "a" }).await?;
//! manager
//!     .update(&UpdateOptions::new(Selector::by_id(id.clone())).set(doc! { "name": "b" }))
//!     .await?;
//! manager.delete_one(&DeleteOptions::new(Selector::by_id(id))).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as itemlayer_core;

pub mod backend;
pub mod config;
pub mod error;
pub mod hooks;
pub mod ident;
pub mod manager;
pub mod notify;
pub mod options;
pub mod path;
pub mod resolver;
