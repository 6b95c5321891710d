//! Storage backend abstraction consumed by the item manager.
//!
//! This module defines the narrow operation contract the manager needs from a
//! document store. Backends receive native BSON filters and update documents
//! (`{"$set": ..., "$unset": ...}`) and report store-native write results.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The operation contract for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use itemlayer::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! let id = backend.insert_one("users", doc! { "name": "Alice" }).await?;
//! let found = backend.find_one("users", doc! { "_id": id }).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::ItemStoreResult;

/// A single-pass stream of documents produced by [`StoreBackend::find`].
pub type DocumentStream = BoxStream<'static, ItemStoreResult<Document>>;

/// Cursor shaping operations applied to a [`StoreBackend::find`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorOp {
    /// Sort by a key document, e.g. `{ "age": -1, "name": 1 }`.
    Sort(Document),
    /// Return at most this many documents.
    Limit(i64),
    /// Skip this many documents.
    Skip(u64),
    /// Restrict returned fields, e.g. `{ "name": 1 }`.
    Projection(Document),
}

/// Flags controlling how a write is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteFlags {
    /// Create the target document if the filter matches nothing.
    pub upsert: bool,
    /// Require acknowledgment of the write by the store.
    pub acknowledged: bool,
}

impl WriteFlags {
    /// Upsert with acknowledgment, the flags forced by auto-insert.
    pub fn upsert_acknowledged() -> Self {
        Self { upsert: true, acknowledged: true }
    }
}

/// Options for [`StoreBackend::create_index`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSpec {
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Optional index name.
    pub name: Option<String>,
}

/// Result of a bulk insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertManyResult {
    /// Identifiers of the inserted documents, in input order.
    pub inserted_ids: Vec<Bson>,
}

/// Result of a single-document update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateResult {
    /// Number of documents matched by the filter.
    pub matched_count: u64,
    /// Number of documents modified.
    pub modified_count: u64,
    /// Identifier of the document created by an upsert, if any.
    pub upserted_id: Option<Bson>,
}

/// Result of a single-document delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteResult {
    /// Number of documents deleted.
    pub deleted_count: u64,
}

/// Abstract interface for document storage backends.
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. Every operation addresses a named collection. Failures are reported as
/// [`ItemStoreError::Store`](crate::error::ItemStoreError::Store) and passed through the
/// manager unchanged.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the first document matching `filter`, or `None`.
    async fn find_one(&self, collection: &str, filter: Document) -> ItemStoreResult<Option<Document>>;

    /// Opens a streaming cursor over the documents matching `filter`.
    ///
    /// # Arguments
    ///
    /// * `collection` - The name of the collection to query
    /// * `filter` - The native filter document
    /// * `shaping` - Cursor operations (sort, limit, skip, projection)
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        shaping: Vec<CursorOp>,
    ) -> ItemStoreResult<DocumentStream>;

    /// Inserts a document and returns its identifier.
    ///
    /// Backends generate an identifier when the document has none.
    async fn insert_one(&self, collection: &str, document: Document) -> ItemStoreResult<Bson>;

    /// Inserts several documents at once.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> ItemStoreResult<InsertManyResult>;

    /// Applies an update document (`$set`/`$unset`) to the first document matching `filter`.
    ///
    /// With `flags.upsert`, a missing document is created from the filter's equality
    /// fields plus the `$set` fields.
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        flags: WriteFlags,
    ) -> ItemStoreResult<UpdateResult>;

    /// Deletes the first document matching `filter`.
    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        flags: WriteFlags,
    ) -> ItemStoreResult<DeleteResult>;

    /// Creates an index over `keys`, e.g. `{ "email": 1 }`.
    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        spec: IndexSpec,
    ) -> ItemStoreResult<()>;

    /// Returns the distinct values of `field` among documents matching `filter`.
    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> ItemStoreResult<Vec<Bson>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op, but backends with external connections
    /// should override this.
    async fn shutdown(self) -> ItemStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> ItemStoreResult<Self::Backend>;
}

