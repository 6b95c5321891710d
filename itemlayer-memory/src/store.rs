//! In-memory storage implementation for item stores.
//!
//! This module provides a simple in-memory backend that keeps documents as BSON
//! documents in per-collection vectors behind async-safe read-write locks.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use bson::{Bson, Document};
use tracing::debug;

use itemlayer_core::{
    backend::{
        CursorOp, DeleteResult, DocumentStream, IndexSpec, InsertManyResult, StoreBackend,
        StoreBackendBuilder, UpdateResult, WriteFlags,
    },
    error::{ItemStoreError, ItemStoreResult},
    path::FieldPath,
};

use crate::{
    evaluator::{Comparable, DocumentEvaluator, compare_values, truthy},
    update::{ID_FIELD, apply_update, upsert_seed, with_identity},
};

type CollectionDocs = Vec<Document>;
type StoreMap = HashMap<String, CollectionDocs>;


/// Thread-safe in-memory document storage backend.
///
/// This struct implements the [`StoreBackend`] trait on top of a map of collections,
/// each holding its documents in insertion order. Filters use the MongoDB filter
/// language (see [`crate::evaluator`]) and updates support `$set` and `$unset`.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Every query scans the whole collection. Indexes are accepted but not built.
///
/// # Example
///
/// ```ignore
/// use itemlayer_memory::InMemoryStore;
/// use itemlayer::backend::StoreBackend;
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let id = store.insert_one("users", doc! { "name": "Alice", "age": 30 }).await?;
///     let found = store.find_one("users", doc! { "_id": id }).await?;
///     assert!(found.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// The main storage map: collection_name -> documents
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`, optionally pre-seeded.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use itemlayer_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder()
    ///     .seed("users", vec![doc! { "name": "a" }])
    ///     .build()
    ///     .await?;
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the number of documents stored in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    fn position(documents: &[Document], filter: &Document) -> ItemStoreResult<Option<usize>> {
        for (index, doc) in documents.iter().enumerate() {
            if DocumentEvaluator::new(doc).matches(filter)? {
                return Ok(Some(index));
            }
        }

        Ok(None)
    }

    fn push(documents: &mut CollectionDocs, collection: &str, document: Document) -> ItemStoreResult<Bson> {
        let (id, stored) = with_identity(document);

        if documents.iter().any(|doc| doc.get(ID_FIELD) == Some(&id)) {
            return Err(ItemStoreError::Store(format!(
                "duplicate key {id} in collection '{collection}'"
            )));
        }

        documents.push(stored);
        Ok(id)
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find_one(&self, collection: &str, filter: Document) -> ItemStoreResult<Option<Document>> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(None);
        };

        Ok(Self::position(documents, &filter)?
            .map(|index| documents[index].clone()))
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        shaping: Vec<CursorOp>,
    ) -> ItemStoreResult<DocumentStream> {
        let store = self.store.read().await;
        let mut matched = match store.get(collection) {
            Some(documents) => DocumentEvaluator::filter_documents(documents, &filter)?,
            None => Vec::new(),
        };
        drop(store);

        let mut skip = 0_usize;
        let mut limit = None;
        let mut projection = None;

        for op in shaping {
            match op {
                CursorOp::Sort(keys) => sort_documents(&mut matched, &keys),
                CursorOp::Skip(n) => skip = n as usize,
                // A zero limit means no limit, a negative one is taken by magnitude.
                CursorOp::Limit(0) => limit = None,
                CursorOp::Limit(n) => limit = Some(n.unsigned_abs() as usize),
                CursorOp::Projection(fields) => projection = Some(fields),
            }
        }

        let documents = matched
            .into_iter()
            .skip(skip)
            .take(limit.unwrap_or(usize::MAX))
            .map(|doc| match &projection {
                Some(fields) => project(&doc, fields),
                None => doc,
            })
            .map(Ok)
            .collect::<Vec<_>>();

        debug!(collection = %collection, returned = documents.len(), "in-memory find");

        Ok(stream::iter(documents).boxed())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> ItemStoreResult<Bson> {
        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        Self::push(documents, collection, document)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> ItemStoreResult<InsertManyResult> {
        let mut store = self.store.write().await;
        let stored = store
            .entry(collection.to_string())
            .or_default();

        let mut inserted_ids = Vec::with_capacity(documents.len());
        for document in documents {
            inserted_ids.push(Self::push(stored, collection, document)?);
        }

        Ok(InsertManyResult { inserted_ids })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        flags: WriteFlags,
    ) -> ItemStoreResult<UpdateResult> {
        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        if let Some(index) = Self::position(documents, &filter)? {
            let mut updated = documents[index].clone();
            let modified = apply_update(&mut updated, &update)?;
            documents[index] = updated;

            return Ok(UpdateResult {
                matched_count: 1,
                modified_count: u64::from(modified),
                upserted_id: None,
            });
        }

        if !flags.upsert {
            return Ok(UpdateResult::default());
        }

        let mut seed = upsert_seed(&filter);
        apply_update(&mut seed, &update)?;
        let id = Self::push(documents, collection, seed)?;

        debug!(collection = %collection, id = %id, "in-memory upsert");

        Ok(UpdateResult {
            matched_count: 0,
            modified_count: 0,
            upserted_id: Some(id),
        })
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        _flags: WriteFlags,
    ) -> ItemStoreResult<DeleteResult> {
        let mut store = self.store.write().await;
        let Some(documents) = store.get_mut(collection) else {
            return Ok(DeleteResult::default());
        };

        match Self::position(documents, &filter)? {
            Some(index) => {
                documents.remove(index);
                Ok(DeleteResult { deleted_count: 1 })
            },
            None => Ok(DeleteResult::default()),
        }
    }

    async fn create_index(
        &self,
        _collection: &str,
        _keys: Document,
        _spec: IndexSpec,
    ) -> ItemStoreResult<()> {
        // In-memory store does not support indexing (no-op)
        Ok(())
    }

    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> ItemStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let Some(documents) = store.get(collection) else {
            return Ok(Vec::new());
        };

        let path = FieldPath::parse(field);
        let mut values: Vec<Bson> = Vec::new();

        for doc in DocumentEvaluator::filter_documents(documents, &filter)? {
            let candidates = match path.get(&doc) {
                Some(Bson::Array(items)) => items.clone(),
                Some(value) => vec![value.clone()],
                None => continue,
            };

            for candidate in candidates {
                let seen = values
                    .iter()
                    .any(|value| Comparable::from(value) == Comparable::from(&candidate));
                if !seen {
                    values.push(candidate);
                }
            }
        }

        Ok(values)
    }
}

/// Stable multi-key sort; a negative key value sorts descending.
fn sort_documents(documents: &mut [Document], keys: &Document) {
    let keys = keys
        .iter()
        .map(|(field, direction)| {
            let descending = match direction {
                Bson::Int32(n) => *n < 0,
                Bson::Int64(n) => *n < 0,
                Bson::Double(n) => *n < 0.0,
                _ => false,
            };
            (FieldPath::parse(field), descending)
        })
        .collect::<Vec<_>>();

    documents.sort_by(|a, b| {
        keys
            .iter()
            .map(|(path, descending)| {
                let ordering = compare_values(path.get(a), path.get(b));
                if *descending { ordering.reverse() } else { ordering }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Applies an inclusion or exclusion projection. `_id` is kept unless excluded.
fn project(document: &Document, fields: &Document) -> Document {
    let inclusive = fields
        .iter()
        .any(|(field, flag)| field != ID_FIELD && truthy(flag));

    if !inclusive {
        let mut projected = document.clone();
        for (field, flag) in fields {
            if !truthy(flag) {
                FieldPath::parse(field).unset(&mut projected);
            }
        }
        return projected;
    }

    let mut projected = Document::new();
    let keep_id = fields.get(ID_FIELD).is_none_or(truthy);

    if keep_id {
        if let Some(id) = document.get(ID_FIELD) {
            projected.insert(ID_FIELD, id.clone());
        }
    }
    for (field, flag) in fields {
        if field == ID_FIELD || !truthy(flag) {
            continue;
        }
        let path = FieldPath::parse(field);
        if let Some(value) = path.get(document) {
            path.set(&mut projected, value.clone());
        }
    }

    projected
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use itemlayer_memory::InMemoryStore;
/// use itemlayer::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder().build().await.unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    seeds: Vec<(String, Vec<Document>)>,
}

impl InMemoryStoreBuilder {
    /// Adds documents to insert into `collection` when the store is built.
    pub fn seed(mut self, collection: impl Into<String>, documents: Vec<Document>) -> Self {
        self.seeds.push((collection.into(), documents));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds a new [`InMemoryStore`] and inserts the seeded documents.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::Store`] if seeded documents share an `_id`.
    async fn build(self) -> ItemStoreResult<Self::Backend> {
        let store = InMemoryStore::new();

        for (collection, documents) in self.seeds {
            store
                .insert_many(&collection, documents)
                .await?;
        }

        Ok(store)
    }
}
