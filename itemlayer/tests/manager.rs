use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use futures::{StreamExt, TryStreamExt, stream};
use itemlayer::{
    backend::{DeleteResult, DocumentStream, InsertManyResult, UpdateResult},
    memory::InMemoryStore,
    prelude::*,
};

const USERS: &str = "users";

/// Wraps the in-memory store and injects failures on demand.
#[derive(Debug, Default)]
struct FaultyStore {
    inner: InMemoryStore,
    /// `find` streams yield an error after this many documents.
    stream_error_after: Option<usize>,
    /// `find_one` succeeds this many times, then fails.
    find_one_budget: Option<usize>,
    find_one_calls: AtomicUsize,
    /// `update_one` writes nothing and reports no match.
    lose_updates: bool,
}

impl FaultyStore {
    fn over(inner: InMemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }
}

#[async_trait]
impl StoreBackend for FaultyStore {
    async fn find_one(&self, collection: &str, filter: Document) -> ItemStoreResult<Option<Document>> {
        let call = self.find_one_calls.fetch_add(1, Ordering::SeqCst);
        if self.find_one_budget.is_some_and(|budget| call >= budget) {
            return Err(ItemStoreError::Store("connection reset".into()));
        }

        self.inner.find_one(collection, filter).await
    }

    async fn find(
        &self,
        collection: &str,
        filter: Document,
        shaping: Vec<CursorOp>,
    ) -> ItemStoreResult<DocumentStream> {
        let stream = self.inner.find(collection, filter, shaping).await?;

        let Some(after) = self.stream_error_after else {
            return Ok(stream);
        };

        let mut items = stream
            .take(after)
            .collect::<Vec<_>>()
            .await;
        items.push(Err(ItemStoreError::Store("cursor killed".into())));

        Ok(stream::iter(items).boxed())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> ItemStoreResult<Bson> {
        self.inner.insert_one(collection, document).await
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> ItemStoreResult<InsertManyResult> {
        self.inner.insert_many(collection, documents).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        flags: WriteFlags,
    ) -> ItemStoreResult<UpdateResult> {
        if self.lose_updates {
            return Ok(UpdateResult::default());
        }

        self.inner.update_one(collection, filter, update, flags).await
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        flags: WriteFlags,
    ) -> ItemStoreResult<DeleteResult> {
        self.inner.delete_one(collection, filter, flags).await
    }

    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        spec: IndexSpec,
    ) -> ItemStoreResult<()> {
        self.inner.create_index(collection, keys, spec).await
    }

    async fn distinct(
        &self,
        collection: &str,
        field: &str,
        filter: Document,
    ) -> ItemStoreResult<Vec<Bson>> {
        self.inner.distinct(collection, field, filter).await
    }
}

fn manager_over(store: impl StoreBackend + 'static, config: ManagerConfig) -> ItemManager {
    let mut manager = ItemManager::new(config);
    manager.init(store, ObjectIdCaster).unwrap();
    manager
}

fn users(store: &InMemoryStore) -> ItemManager {
    manager_over(store.clone(), ManagerConfig::for_collection(USERS))
}

async fn record_events(manager: &ItemManager) -> Arc<Mutex<Vec<ItemEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    manager
        .subscribe(move |event: &ItemEvent| sink.lock().unwrap().push(event.clone()))
        .await;

    events
}

fn hex(id: &Bson) -> String {
    id.as_object_id().unwrap().to_hex()
}

#[tokio::test]
async fn insert_update_delete_round() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    let events = record_events(&manager).await;

    let id = manager.insert_one(doc! { "name": "a" }).await.unwrap();
    let by_text = ReadOptions::new(Selector::by_id(hex(&id)));

    let found = manager.get_one(&by_text).await.unwrap().unwrap();
    assert_eq!(found.get_str("name").unwrap(), "a");

    let result = manager
        .update(&UpdateOptions::new(Selector::by_id(hex(&id))).set(doc! { "name": "b" }))
        .await
        .unwrap();
    assert_eq!(result.matched_count, 1);

    {
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), ITEM_UPDATED);
        assert_eq!(events[0].item(), &doc! { "_id": id.clone(), "name": "b" });
    }

    let deleted = manager
        .delete_one(&DeleteOptions::new(Selector::by_id(hex(&id))))
        .await
        .unwrap();
    assert_eq!(deleted.deleted_count, 1);

    assert!(manager.get_one(&by_text).await.unwrap().is_none());
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_id_is_rejected_before_the_store() {
    let store = InMemoryStore::new();
    let manager = users(&store);

    let err = manager
        .get_one(&ReadOptions::new(Selector::by_id("not-an-id")))
        .await
        .unwrap_err();
    assert!(matches!(err, ItemStoreError::InvalidIdentifier(ref v) if v == "not-an-id"));

    let err = manager
        .update(&UpdateOptions::new(Selector::by_ids(["bad"])).set(doc! { "a": 1 }).auto_insert(true))
        .await
        .unwrap_err();
    assert!(matches!(err, ItemStoreError::InvalidIdentifier(_)));
    assert_eq!(store.count(USERS).await, 0);
}

#[tokio::test]
async fn id_and_ids_resolve_into_the_filter() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    let oid = ObjectId::new();

    let filter = manager
        .resolve(&Selector::by_filter(doc! { "x": 1 }).id(oid.to_hex()))
        .unwrap();
    assert_eq!(filter, doc! { "x": 1, "_id": oid });

    let filter = manager
        .resolve(&Selector::by_ids([oid.to_hex()]))
        .unwrap();
    assert_eq!(filter, doc! { "_id": { "$in": [oid] } });
}

#[tokio::test]
async fn update_of_missing_item_fails_without_writing() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    let events = record_events(&manager).await;

    let err = manager
        .update(&UpdateOptions::new(Selector::by_id(ObjectId::new())).set(doc! { "name": "b" }))
        .await
        .unwrap_err();

    assert!(matches!(err, ItemStoreError::NotFound(ref msg) if msg == "no item found"));
    assert_eq!(store.count(USERS).await, 0);
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn auto_insert_update_upserts_payload_and_set() {
    let store = InMemoryStore::new();
    let manager = manager_over(
        store.clone(),
        ManagerConfig::for_collection(USERS).with_auto_insert(true),
    );
    let events = record_events(&manager).await;
    let oid = ObjectId::new();

    let result = manager
        .update(
            &UpdateOptions::new(Selector::by_id(oid.to_hex()))
                .payload(doc! { "name": "seed", "role": "user" })
                .set(doc! { "name": "b" }),
        )
        .await
        .unwrap();

    assert_eq!(result.upserted_id, Some(Bson::ObjectId(oid)));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].item(), &doc! { "_id": oid, "role": "user", "name": "b" });
}

#[tokio::test]
async fn get_one_auto_inserts_the_filter() {
    let store = InMemoryStore::new();
    let manager = users(&store);

    let read = ReadOptions::new(Selector::by_filter(doc! { "name": "x" })).auto_insert(true);

    let item = manager.get_one(&read).await.unwrap().unwrap();
    let id = item.get_object_id("_id").unwrap();
    assert_eq!(item, doc! { "_id": id, "name": "x" });

    manager.get_one(&read).await.unwrap();
    assert_eq!(store.count(USERS).await, 1);
}

#[tokio::test]
async fn get_one_auto_inserts_under_the_cast_id() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    let oid = ObjectId::new();

    let read = ReadOptions::new(Selector::by_filter(doc! { "kind": "profile" }).id(oid.to_hex()))
        .auto_insert(true);

    let item = manager.get_one(&read).await.unwrap().unwrap();
    assert_eq!(item, doc! { "_id": oid, "kind": "profile" });
    assert_eq!(store.count(USERS).await, 1);
}

#[tokio::test]
async fn auto_insert_update_of_a_filter_field_inserts_nothing_more() {
    let store = InMemoryStore::new();
    let manager = manager_over(
        store.clone(),
        ManagerConfig::for_collection(USERS).with_auto_insert(true),
    );
    manager.insert_one(doc! { "name": "a" }).await.unwrap();

    let result = manager
        .update(&UpdateOptions::new(Selector::by_filter(doc! { "name": "a" })).set(doc! { "name": "b" }))
        .await
        .unwrap();

    assert_eq!(result.matched_count, 1);
    assert_eq!(store.count(USERS).await, 1);
    assert!(store.find_one(USERS, doc! { "name": "b" }).await.unwrap().is_some());
}

#[tokio::test]
async fn update_without_fields_is_rejected_before_the_store() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    let events = record_events(&manager).await;
    let id = manager.insert_one(doc! { "name": "a" }).await.unwrap();

    let err = manager
        .update(&UpdateOptions::new(Selector::by_id(id.clone())).payload(doc! { "name": "ignored" }))
        .await
        .unwrap_err();
    assert!(matches!(err, ItemStoreError::Configuration(_)));

    let err = manager
        .update(&UpdateOptions::new(Selector::by_id(ObjectId::new())).auto_insert(true))
        .await
        .unwrap_err();
    assert!(matches!(err, ItemStoreError::Configuration(_)));

    assert_eq!(store.count(USERS).await, 1);
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn validation_transforms_or_rejects() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    let id = manager.insert_one(doc! { "name": "a" }).await.unwrap();

    let tagged = manager
        .get_one(
            &ReadOptions::new(Selector::by_id(id.clone())).validate(
                |mut item: Document| -> HookResult<Document> {
                    item.insert("checked", true);
                    Ok(item)
                },
            ),
        )
        .await
        .unwrap()
        .unwrap();
    assert!(tagged.get_bool("checked").unwrap());

    let err = manager
        .get_one(
            &ReadOptions::new(Selector::by_id(id)).validate(
                |_item: Document| -> HookResult<Document> { Err("name is too short".into()) },
            ),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ItemStoreError::ValidationFailure(ref msg) if msg == "name is too short"));
}

#[tokio::test]
async fn failed_validation_during_update_check_aborts_the_write() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    let id = manager.insert_one(doc! { "name": "a" }).await.unwrap();

    let err = manager
        .update(
            &UpdateOptions::new(Selector::by_id(id.clone()))
                .set(doc! { "name": "b" })
                .validate(|_item: Document| -> HookResult<Document> { Err("locked".into()) }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ItemStoreError::ValidationFailure(_)));

    let item = manager.get_one(&ReadOptions::new(Selector::by_id(id))).await.unwrap().unwrap();
    assert_eq!(item.get_str("name").unwrap(), "a");
}

#[tokio::test]
async fn get_many_shapes_and_maps_the_cursor() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    manager
        .insert_many(vec![
            doc! { "name": "c", "age": 30 },
            doc! { "name": "a", "age": 20 },
            doc! { "name": "b", "age": 40 },
        ])
        .await
        .unwrap();

    let names = manager
        .get_many(
            &ReadOptions::new(Selector::by_filter(doc! { "age": { "$gte": 25 } }))
                .sort(doc! { "age": -1 })
                .limit(5)
                .modifier(CursorOp::Projection(doc! { "name": 1, "_id": 0 }))
                .on_data(|mut item| {
                    item.insert("seen", true);
                    item
                }),
        )
        .await
        .unwrap();

    assert_eq!(names, vec![
        doc! { "name": "b", "seen": true },
        doc! { "name": "c", "seen": true },
    ]);

    let limited = manager
        .get_many(&ReadOptions::new(Selector::new()).sort(doc! { "name": 1 }).limit(1))
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].get_str("name").unwrap(), "a");
}

#[tokio::test]
async fn get_many_by_ids() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    let inserted = manager
        .insert_many(vec![doc! { "n": 1 }, doc! { "n": 2 }, doc! { "n": 3 }])
        .await
        .unwrap();

    let picked = manager
        .get_many(&ReadOptions::new(Selector::by_ids([
            hex(&inserted.inserted_ids[0]),
            hex(&inserted.inserted_ids[2]),
        ])))
        .await
        .unwrap();

    let numbers = picked
        .iter()
        .map(|item| item.get_i32("n").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(numbers, vec![1, 3]);
}

#[tokio::test]
async fn get_many_fails_on_mid_stream_error() {
    let inner = InMemoryStore::new();
    let manager = manager_over(
        FaultyStore {
            stream_error_after: Some(1),
            ..FaultyStore::over(inner.clone())
        },
        ManagerConfig::for_collection(USERS),
    );
    manager
        .insert_many(vec![doc! { "n": 1 }, doc! { "n": 2 }])
        .await
        .unwrap();

    let err = manager
        .get_many(&ReadOptions::new(Selector::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, ItemStoreError::Store(ref msg) if msg == "cursor killed"));
}

#[tokio::test]
async fn get_path_soft_fails() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    let id = manager
        .insert_one(doc! { "profile": { "city": "Lisbon" }, "tags": ["x", "y"] })
        .await
        .unwrap();
    let read = ReadOptions::new(Selector::by_id(id));

    assert_eq!(
        manager.get_path(&read, "profile.city").await.unwrap(),
        Some(Bson::from("Lisbon"))
    );
    assert_eq!(manager.get_path(&read, "tags.1").await.unwrap(), Some(Bson::from("y")));
    assert_eq!(manager.get_path(&read, "profile.zip").await.unwrap(), None);
    assert_eq!(manager.get_path(&read, "tags.1.deeper").await.unwrap(), None);

    let missing = ReadOptions::new(Selector::by_id(ObjectId::new()));
    assert_eq!(manager.get_path(&missing, "profile").await.unwrap(), None);
}

#[tokio::test]
async fn set_path_writes_nested_values() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    let events = record_events(&manager).await;
    let id = manager.insert_one(doc! { "name": "a" }).await.unwrap();

    manager
        .set_path(Selector::by_id(id.clone()), "profile.city", "Porto")
        .await
        .unwrap();

    let read = ReadOptions::new(Selector::by_id(id));
    assert_eq!(manager.get_path(&read, "profile.city").await.unwrap(), Some(Bson::from("Porto")));
    assert_eq!(events.lock().unwrap().len(), 1);

    let err = manager
        .set_path(Selector::by_id(ObjectId::new()), "name", "z")
        .await
        .unwrap_err();
    assert!(matches!(err, ItemStoreError::NotFound(_)));
}

#[tokio::test]
async fn set_path_with_auto_insert_creates_the_item() {
    let store = InMemoryStore::new();
    let manager = manager_over(
        store.clone(),
        ManagerConfig::for_collection(USERS).with_auto_insert(true),
    );
    let oid = ObjectId::new();

    let result = manager
        .set_path(Selector::by_id(oid), "settings.theme", "dark")
        .await
        .unwrap();

    assert_eq!(result.upserted_id, Some(Bson::ObjectId(oid)));
    assert_eq!(store.count(USERS).await, 1);
}

#[tokio::test]
async fn delete_hook_runs_after_the_delete() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    let id = manager.insert_one(doc! { "name": "a" }).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    manager
        .delete_one(
            &DeleteOptions::new(Selector::by_filter(doc! { "name": "a" }).id(hex(&id)))
                .on_delete_item(move |item: DeletedItem| -> HookResult<()> {
                    sink.lock().unwrap().push(item);
                    Ok(())
                }),
        )
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![DeletedItem {
        identity: Some(id),
        find: Some(doc! { "name": "a" }),
    }]);
    assert_eq!(store.count(USERS).await, 0);
}

#[tokio::test]
async fn failing_delete_hook_reports_after_commit() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    let id = manager.insert_one(doc! { "name": "a" }).await.unwrap();

    let err = manager
        .delete_one(
            &DeleteOptions::new(Selector::by_id(id)).on_delete_item(
                |_item: DeletedItem| -> HookResult<()> { Err("audit log unavailable".into()) },
            ),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ItemStoreError::HookFailure(ref msg) if msg == "audit log unavailable"));
    assert_eq!(store.count(USERS).await, 0);
}

#[tokio::test]
async fn operations_fail_before_init() {
    let manager = ItemManager::new(ManagerConfig::for_collection(USERS));
    assert!(!manager.is_initialized());

    let err = manager
        .get_one(&ReadOptions::new(Selector::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, ItemStoreError::Configuration(_)));

    let err = manager.insert_one(doc! { "a": 1 }).await.unwrap_err();
    assert!(matches!(err, ItemStoreError::Configuration(_)));
}

#[tokio::test]
async fn init_rejects_invalid_config_and_missing_collection_fails_calls() {
    let mut manager = ItemManager::new(ManagerConfig::default().with_identity_field(""));
    let err = manager.init(InMemoryStore::new(), ObjectIdCaster).unwrap_err();
    assert!(matches!(err, ItemStoreError::Configuration(_)));

    let store = InMemoryStore::new();
    let manager = manager_over(store.clone(), ManagerConfig::default());
    let err = manager
        .get_one(&ReadOptions::new(Selector::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, ItemStoreError::Configuration(_)));

    let item = manager
        .get_one(&ReadOptions::new(Selector::new().collection("other")).auto_insert(true))
        .await
        .unwrap();
    assert!(item.is_some());
    assert_eq!(store.count("other").await, 1);
}

#[tokio::test]
async fn failed_refetch_keeps_the_update_result() {
    let inner = InMemoryStore::new();
    let id = inner.insert_one(USERS, doc! { "name": "a" }).await.unwrap();

    let manager = manager_over(
        FaultyStore {
            find_one_budget: Some(1),
            ..FaultyStore::over(inner.clone())
        },
        ManagerConfig::for_collection(USERS),
    );
    let events = record_events(&manager).await;

    let result = manager
        .update(&UpdateOptions::new(Selector::by_id(id.clone())).set(doc! { "name": "b" }))
        .await
        .unwrap();

    assert_eq!(result.modified_count, 1);
    assert!(events.lock().unwrap().is_empty());

    let stored = inner.find_one(USERS, doc! { "_id": id }).await.unwrap().unwrap();
    assert_eq!(stored.get_str("name").unwrap(), "b");
}

#[tokio::test]
async fn item_vanishing_before_the_write_is_not_found() {
    let inner = InMemoryStore::new();
    let id = inner.insert_one(USERS, doc! { "name": "a" }).await.unwrap();

    let manager = manager_over(
        FaultyStore {
            lose_updates: true,
            ..FaultyStore::over(inner)
        },
        ManagerConfig::for_collection(USERS),
    );

    let err = manager
        .update(&UpdateOptions::new(Selector::by_id(id)).set(doc! { "name": "b" }))
        .await
        .unwrap_err();

    assert!(matches!(err, ItemStoreError::NotFound(_)));
}

#[tokio::test]
async fn unsubscribed_handlers_stop_receiving() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    let id = manager.insert_one(doc! { "n": 1 }).await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let subscription = manager
        .subscribe(move |_event: &ItemEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    let update = UpdateOptions::new(Selector::by_id(id)).set(doc! { "n": 2 });
    manager.update(&update).await.unwrap();

    assert!(manager.unsubscribe(subscription).await);
    manager.update(&update).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn distinct_and_indexes() {
    let store = InMemoryStore::new();
    let manager = users(&store);
    manager
        .insert_many(vec![
            doc! { "role": "admin" },
            doc! { "role": "user" },
            doc! { "role": "user" },
        ])
        .await
        .unwrap();

    let roles = manager.distinct("role", &Selector::new()).await.unwrap();
    assert_eq!(roles, vec![Bson::from("admin"), Bson::from("user")]);

    manager
        .create_index(None, doc! { "role": 1 }, IndexSpec::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn config_loaded_from_json_drives_defaults() {
    let config = ManagerConfig::from_json_str(&serde_json::json!({
        "collection": USERS,
        "auto_insert": true,
    }).to_string())
    .unwrap();

    let store = InMemoryStore::new();
    let manager = manager_over(store.clone(), config);

    let item = manager
        .get_one(&ReadOptions::new(Selector::by_filter(doc! { "name": "auto" })))
        .await
        .unwrap();

    assert!(item.is_some());
    assert_eq!(store.count(USERS).await, 1);
}

#[tokio::test]
async fn cursor_results_stream_lazily_through_the_backend() {
    let store = InMemoryStore::new();
    store
        .insert_many(USERS, vec![doc! { "n": 1 }, doc! { "n": 2 }])
        .await
        .unwrap();

    let first = store
        .find(USERS, doc! {}, vec![CursorOp::Skip(1)])
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].get_i32("n").unwrap(), 2);
}
