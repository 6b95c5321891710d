use std::collections::BTreeMap;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use bson::{Bson, Document};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    options::{
        Acknowledgment, ClientOptions, DeleteOptions, FindOptions, IndexOptions, UpdateOptions,
        WriteConcern,
    },
};
use tracing::{debug, info};

use itemlayer_core::{
    backend::{
        CursorOp, DeleteResult, DocumentStream, IndexSpec, InsertManyResult, StoreBackend,
        StoreBackendBuilder, UpdateResult, WriteFlags,
    },
    error::{ItemStoreError, ItemStoreResult},
};


/// MongoDB storage backend.
///
/// Filters and update documents are handed to the driver as they are. Every driver
/// error is reported as [`ItemStoreError::Store`].
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

fn store_error(err: mongodb::error::Error) -> ItemStoreError {
    ItemStoreError::Store(err.to_string())
}

/// Folds cursor shaping operations into driver find options. Later operations win.
fn find_options(shaping: Vec<CursorOp>) -> FindOptions {
    let mut options = FindOptions::default();

    for op in shaping {
        match op {
            CursorOp::Sort(keys) => options.sort = Some(keys),
            CursorOp::Limit(limit) => options.limit = Some(limit),
            CursorOp::Skip(skip) => options.skip = Some(skip),
            CursorOp::Projection(fields) => options.projection = Some(fields),
        }
    }

    options
}

/// Write concern for `flags`; `None` keeps the collection default.
fn write_concern(flags: WriteFlags) -> Option<WriteConcern> {
    flags.acknowledged.then(|| {
        let mut concern = WriteConcern::default();
        concern.w = Some(Acknowledgment::Nodes(1));
        concern
    })
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find_one(&self, collection: &str, filter: Document) -> ItemStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(filter)
            .await
            .map_err(store_error)
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        shaping: Vec<CursorOp>,
    ) -> ItemStoreResult<DocumentStream> {
        let cursor = self.get_collection(collection)
            .find(filter)
            .with_options(find_options(shaping))
            .await
            .map_err(store_error)?;

        Ok(cursor
            .map_err(store_error)
            .boxed())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> ItemStoreResult<Bson> {
        Ok(self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(store_error)?
            .inserted_id)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> ItemStoreResult<InsertManyResult> {
        if documents.is_empty() {
            return Ok(InsertManyResult::default());
        }

        let inserted = self.get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(store_error)?;

        // The driver keys ids by input position.
        Ok(InsertManyResult {
            inserted_ids: inserted
                .inserted_ids
                .into_iter()
                .collect::<BTreeMap<_, _>>()
                .into_values()
                .collect(),
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        flags: WriteFlags,
    ) -> ItemStoreResult<UpdateResult> {
        let mut options = UpdateOptions::default();
        options.upsert = Some(flags.upsert);
        options.write_concern = write_concern(flags);

        let result = self.get_collection(collection)
            .update_one(filter, update)
            .with_options(options)
            .await
            .map_err(store_error)?;

        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        flags: WriteFlags,
    ) -> ItemStoreResult<DeleteResult> {
        let mut options = DeleteOptions::default();
        options.write_concern = write_concern(flags);

        let result = self.get_collection(collection)
            .delete_one(filter)
            .with_options(options)
            .await
            .map_err(store_error)?;

        Ok(DeleteResult {
            deleted_count: result.deleted_count,
        })
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        spec: IndexSpec,
    ) -> ItemStoreResult<()> {
        debug!(collection = %collection, keys = %keys, unique = spec.unique, "creating index");

        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                    .unique(spec.unique)
                    .name(spec.name)
                    .build()
                )
                .build()
            )
            .await
            .map_err(store_error)?;

        Ok(())
    }

    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> ItemStoreResult<Vec<Bson>> {
        self.get_collection(collection)
            .distinct(field, filter)
            .await
            .map_err(store_error)
    }

    async fn shutdown(self) -> ItemStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    /// Parses the connection string and creates the client.
    ///
    /// The driver connects lazily, so an unreachable server surfaces on first use.
    async fn build(self) -> ItemStoreResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| ItemStoreError::Configuration(e.to_string()))?,
        )
        .map_err(|e| ItemStoreError::Configuration(e.to_string()))?;

        info!(database = %self.database, "mongodb client created");

        Ok(MongoDbStore::new(client, self.database))
    }
}
