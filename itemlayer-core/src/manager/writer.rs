use bson::{Bson, Document};
use tracing::{debug, warn};

use crate::{
    backend::{DeleteResult, InsertManyResult, UpdateResult, WriteFlags},
    error::{ItemStoreError, ItemStoreResult},
    hooks::DeletedItem,
    notify::ItemEvent,
    options::{DeleteOptions, Selector, UpdateOptions},
    path::FieldPath,
};

use super::ItemManager;

const NO_ITEM_FOUND: &str = "no item found";
const NOTHING_TO_WRITE: &str = "update has no fields to set or unset";

impl ItemManager {
    /// Inserts `payload` into the configured collection and returns its identifier.
    pub async fn insert_one(&self, payload: Document) -> ItemStoreResult<Bson> {
        let collection = self.collection_name(&Selector::new())?;
        self.insert_one_into(&collection, payload).await
    }

    /// Inserts `payload` into `collection` and returns its identifier.
    pub async fn insert_one_into(&self, collection: &str, payload: Document) -> ItemStoreResult<Bson> {
        let backend = self.backend()?;

        debug!(collection = %collection, "insert_one");

        backend
            .insert_one(collection, payload)
            .await
    }

    /// Inserts several documents into the configured collection.
    pub async fn insert_many(&self, payloads: Vec<Document>) -> ItemStoreResult<InsertManyResult> {
        let backend = self.backend()?;
        let collection = self.collection_name(&Selector::new())?;

        debug!(collection = %collection, count = payloads.len(), "insert_many");

        backend
            .insert_many(&collection, payloads)
            .await
    }

    /// Updates the document selected by `options` and notifies subscribers.
    ///
    /// Without auto-insert the target must exist, checked with a [`get_one`](Self::get_one)
    /// on the same options. With auto-insert the write is forced to upsert with
    /// acknowledgment. When the write upserts, `payload` seeds the `$set` fields and
    /// explicit `set` fields override it.
    ///
    /// An update that would neither set nor unset anything is rejected before the
    /// store is touched.
    ///
    /// After the write the document is re-fetched and published as
    /// [`ItemEvent::Updated`]. A failed re-fetch only suppresses the notification, the
    /// write result is still returned.
    ///
    /// # Errors
    ///
    /// - [`ItemStoreError::NotFound`] if the target does not exist and auto-insert is off
    /// - [`ItemStoreError::Configuration`] if there is nothing to write
    /// - any error of the resolution, the existence check or the write itself
    pub async fn update(&self, options: &UpdateOptions) -> ItemStoreResult<UpdateResult> {
        let backend = self.backend()?;
        let collection = self.collection_name(&options.selector)?;

        let auto_insert = options.auto_insert.unwrap_or(self.config.auto_insert);
        let flags = if auto_insert {
            WriteFlags::upsert_acknowledged()
        } else {
            options.flags.unwrap_or(self.config.flags)
        };

        let filter = self.resolve(&options.selector)?;
        let update = write_document(options, flags);

        if update.is_empty() {
            return Err(ItemStoreError::Configuration(NOTHING_TO_WRITE.into()));
        }

        // Neither read auto-inserts; the write itself upserts when auto-insert is on.
        let read = options.read_options();

        if !auto_insert && self.get_one(&read).await?.is_none() {
            return Err(ItemStoreError::NotFound(NO_ITEM_FOUND.into()));
        }

        debug!(collection = %collection, filter = %filter, update = %update, "update");

        let result = backend
            .update_one(&collection, filter, update, flags)
            .await?;

        // The target vanished between the existence check and the write.
        if !auto_insert && result.matched_count == 0 && result.upserted_id.is_none() {
            return Err(ItemStoreError::NotFound(NO_ITEM_FOUND.into()));
        }

        match self.get_one(&read).await {
            Ok(Some(item)) => {
                self.notifier
                    .publish(&ItemEvent::Updated { collection, item })
                    .await;
            }
            Ok(None) => debug!(collection = %collection, "updated item not found on re-fetch"),
            Err(err) => warn!(
                collection = %collection,
                error = %err,
                "re-fetch after update failed, change notification skipped"
            ),
        }

        Ok(result)
    }

    /// Sets the value at `path` on the selected document, with upsert forced.
    pub async fn set_path(
        &self,
        selector: Selector,
        path: impl Into<FieldPath>,
        value: impl Into<Bson>,
    ) -> ItemStoreResult<UpdateResult> {
        let mut set = Document::new();
        set.insert(path.into().to_string(), value.into());

        self.update(&UpdateOptions::new(selector).set(set).upsert())
            .await
    }

    /// Deletes the document selected by `options`.
    ///
    /// The deletion is committed before the `on_delete_item` hook runs. A failing hook
    /// is reported as [`ItemStoreError::HookFailure`] even though the document is gone.
    pub async fn delete_one(&self, options: &DeleteOptions) -> ItemStoreResult<DeleteResult> {
        let backend = self.backend()?;
        let collection = self.collection_name(&options.selector)?;
        let resolver = self.resolver()?;

        let filter = resolver.resolve(&options.selector)?;
        let identity = resolver.resolve_identity(&options.selector)?;
        let flags = options.flags.unwrap_or(self.config.flags);

        debug!(collection = %collection, filter = %filter, "delete_one");

        let result = backend
            .delete_one(&collection, filter, flags)
            .await?;

        if let Some(hook) = &options.on_delete_item {
            hook.on_delete(DeletedItem {
                identity,
                find: options.selector.find.clone(),
            })
            .await
            .map_err(|err| ItemStoreError::HookFailure(err.to_string()))?;
        }

        Ok(result)
    }
}

/// Builds the `$set`/`$unset` update document for `options`.
///
/// Payload fields only seed upserts. Any payload field whose path equals, contains or
/// lies under an explicit `set` or `unset` path is dropped.
fn write_document(options: &UpdateOptions, flags: WriteFlags) -> Document {
    let explicit_paths = options
        .set
        .iter()
        .chain(options.unset.iter())
        .flat_map(|fields| fields.keys())
        .collect::<Vec<_>>();

    let mut set = Document::new();

    if flags.upsert {
        if let Some(payload) = &options.payload {
            for (key, value) in payload {
                if explicit_paths.iter().any(|path| paths_overlap(key, path)) {
                    continue;
                }
                set.insert(key.clone(), value.clone());
            }
        }
    }
    if let Some(explicit) = &options.set {
        for (key, value) in explicit {
            set.insert(key.clone(), value.clone());
        }
    }

    let mut update = Document::new();
    if !set.is_empty() {
        update.insert("$set", set);
    }
    if let Some(unset) = &options.unset {
        update.insert("$unset", unset.clone());
    }

    update
}

/// Returns `true` if one dot path equals the other or is a parent of it.
fn paths_overlap(a: &str, b: &str) -> bool {
    let nested = |parent: &str, child: &str| {
        child
            .strip_prefix(parent)
            .is_some_and(|rest| rest.starts_with('.'))
    };

    a == b || nested(a, b) || nested(b, a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn explicit_set_overrides_payload_on_upsert() {
        let options = UpdateOptions::new(Selector::new())
            .payload(doc! { "name": "seed", "kind": "x" })
            .set(doc! { "name": "b" })
            .unset(doc! { "old": "" });

        let update = write_document(&options, WriteFlags::upsert_acknowledged());

        assert_eq!(update, doc! {
            "$set": { "name": "b", "kind": "x" },
            "$unset": { "old": "" },
        });
    }

    #[test]
    fn payload_yields_to_unset_and_nested_set_paths() {
        let options = UpdateOptions::new(Selector::new())
            .payload(doc! {
                "name": "seed",
                "old": 1,
                "profile": { "city": "x" },
                "meta.tags": ["a"],
                "address": "none",
            })
            .set(doc! { "profile.city": "Porto", "meta": { "tags": [] } })
            .unset(doc! { "old": "", "address.zip": "" });

        let update = write_document(&options, WriteFlags::upsert_acknowledged());

        assert_eq!(update, doc! {
            "$set": { "name": "seed", "profile.city": "Porto", "meta": { "tags": [] } },
            "$unset": { "old": "", "address.zip": "" },
        });
    }

    #[test]
    fn overlapping_paths_need_a_dot_boundary() {
        assert!(paths_overlap("a", "a"));
        assert!(paths_overlap("a", "a.b"));
        assert!(paths_overlap("a.b.c", "a.b"));
        assert!(!paths_overlap("ab", "a"));
        assert!(!paths_overlap("a.b", "a.c"));
    }

    #[test]
    fn payload_is_ignored_without_upsert() {
        let options = UpdateOptions::new(Selector::new())
            .payload(doc! { "name": "seed" })
            .set(doc! { "count": 2 });

        let update = write_document(&options, WriteFlags::default());

        assert_eq!(update, doc! { "$set": { "count": 2 } });
    }

    #[test]
    fn empty_set_is_omitted() {
        let options = UpdateOptions::new(Selector::new()).unset(doc! { "a": "" });

        assert_eq!(write_document(&options, WriteFlags::default()), doc! { "$unset": { "a": "" } });
    }
}
