use bson::{Bson, Document};
use futures::TryStreamExt;
use tracing::debug;

use crate::{
    backend::CursorOp,
    error::{ItemStoreError, ItemStoreResult},
    options::ReadOptions,
    path::FieldPath,
};

use super::ItemManager;

impl ItemManager {
    /// Fetches a single document.
    ///
    /// On a miss with auto-insert enabled, a document built from the resolved filter is
    /// inserted and looked up again with a freshly resolved filter. The configured
    /// validator runs on whatever is found.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when nothing matches and auto-insert is off.
    ///
    /// # Errors
    ///
    /// - [`ItemStoreError::InvalidIdentifier`] if an identifier fails to cast
    /// - [`ItemStoreError::ValidationFailure`] if the validator rejects the document
    /// - [`ItemStoreError::Store`] for any store failure, including the auto-insert
    pub async fn get_one(&self, options: &ReadOptions) -> ItemStoreResult<Option<Document>> {
        let backend = self.backend()?;
        let collection = self.collection_name(&options.selector)?;
        let filter = self.resolve(&options.selector)?;

        debug!(collection = %collection, filter = %filter, "get_one");

        let mut found = backend
            .find_one(&collection, filter.clone())
            .await?;

        if found.is_none() && options.auto_insert.unwrap_or(self.config.auto_insert) {
            debug!(collection = %collection, seed = %filter, "auto-inserting missing item");

            backend
                .insert_one(&collection, filter)
                .await?;

            let filter = self.resolve(&options.selector)?;
            found = backend
                .find_one(&collection, filter)
                .await?;
        }

        match (found, &options.validate) {
            (Some(item), Some(validator)) => validator
                .validate(item)
                .await
                .map(Some)
                .map_err(|err| ItemStoreError::ValidationFailure(err.to_string())),
            (found, _) => Ok(found),
        }
    }

    /// Fetches every document matching the options, in cursor order.
    ///
    /// `sort` and `limit` are folded into the cursor ahead of the extra `modifiers`;
    /// `on_data` is applied to each document as it streams in. A stream error fails the
    /// whole call, no partial list is returned.
    pub async fn get_many(&self, options: &ReadOptions) -> ItemStoreResult<Vec<Document>> {
        let backend = self.backend()?;
        let collection = self.collection_name(&options.selector)?;
        let filter = self.resolve(&options.selector)?;

        let mut shaping = Vec::with_capacity(options.modifiers.len() + 2);
        if let Some(sort) = &options.sort {
            shaping.push(CursorOp::Sort(sort.clone()));
        }
        if let Some(limit) = options.limit {
            shaping.push(CursorOp::Limit(limit));
        }
        shaping.extend(options.modifiers.iter().cloned());

        debug!(collection = %collection, filter = %filter, shaping = ?shaping, "get_many");

        backend
            .find(&collection, filter, shaping)
            .await?
            .map_ok(|item| match &options.on_data {
                Some(mapper) => mapper(item),
                None => item,
            })
            .try_collect::<Vec<_>>()
            .await
    }

    /// Fetches a single document and returns the value at `path`.
    ///
    /// Both a missing document and a path that does not resolve yield `Ok(None)`;
    /// only failures of the underlying [`get_one`](Self::get_one) are errors.
    pub async fn get_path(
        &self,
        options: &ReadOptions,
        path: impl Into<FieldPath>,
    ) -> ItemStoreResult<Option<Bson>> {
        let path = path.into();

        Ok(self
            .get_one(options)
            .await?
            .and_then(|item| path.get(&item).cloned()))
    }
}
