//! Convenient re-exports of commonly used types from itemlayer.
//!
//! ```ignore
//! use itemlayer::prelude::*;
//! ```
//!
//! This provides access to the manager and its options, the hook traits, identifier
//! casters, store backend traits and the error types.

pub use itemlayer_core::{
    manager::ItemManager,
    config::ManagerConfig,
    options::{Selector, ReadOptions, UpdateOptions, DeleteOptions},
    hooks::{ItemValidator, DeleteHook, DeletedItem},
    ident::{IdentifierCaster, ObjectIdCaster, UuidCaster},
    notify::{ItemEvent, SubscriptionId, ITEM_UPDATED},
    path::FieldPath,
    backend::{StoreBackend, StoreBackendBuilder, CursorOp, WriteFlags, IndexSpec},
    error::{ItemStoreError, ItemStoreResult, HookResult},
};
