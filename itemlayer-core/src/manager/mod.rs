//! The item manager: resolves call options into store operations.
//!
//! An [`ItemManager`] is created from a [`ManagerConfig`] and bound to a store with
//! [`ItemManager::init`]. Reads live in the `reader` module, writes in `writer`.
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
//! let id = manager.insert_one(doc! { "name": "a" }).await?;
//! let user = manager.get_one(&ReadOptions::new(Selector::by_id(id))).await?;
//! ```

mod reader;
mod writer;

use bson::{Bson, Document};
use std::{fmt, sync::Arc};
use tracing::info;

use crate::{
    backend::{IndexSpec, StoreBackend},
    config::ManagerConfig,
    error::{ItemStoreError, ItemStoreResult},
    ident::IdentifierCaster,
    notify::{ChangeNotifier, ItemEvent, SubscriptionId},
    options::Selector,
    resolver::ParamResolver,
};

/// Store and caster the manager was bound to by `init`.
struct Binding {
    backend: Arc<dyn StoreBackend>,
    caster: Arc<dyn IdentifierCaster>,
}

pub struct ItemManager {
    config: ManagerConfig,
    binding: Option<Binding>,
    notifier: ChangeNotifier,
}

impl ItemManager {
    /// Creates an unbound manager. Every operation fails until [`init`](Self::init) is called.
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            binding: None,
            notifier: ChangeNotifier::new(),
        }
    }

    /// Binds the manager to a store backend and an identifier caster.
    ///
    /// Calling `init` again rebinds the manager.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::Configuration`] if the configuration is invalid.
    pub fn init<B, C>(&mut self, backend: B, caster: C) -> ItemStoreResult<()>
    where
        B: StoreBackend + 'static,
        C: IdentifierCaster + 'static,
    {
        self.config.validate()?;
        self.binding = Some(Binding {
            backend: Arc::new(backend),
            caster: Arc::new(caster),
        });

        info!(
            collection = self.config.collection.as_deref().unwrap_or("<per call>"),
            identity_field = %self.config.identity_field,
            auto_insert = self.config.auto_insert,
            "item manager initialized"
        );

        Ok(())
    }

    /// Returns `true` once [`init`](Self::init) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.binding.is_some()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The change notification channel owned by this manager.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Subscribes to this manager's change notifications.
    pub async fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ItemEvent) + Send + Sync + 'static,
    {
        self.notifier.subscribe(handler).await
    }

    /// Removes a change notification handler.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id).await
    }

    /// Builds the filter a call with `selector` would run against.
    pub fn resolve(&self, selector: &Selector) -> ItemStoreResult<Document> {
        self.resolver()?.resolve(selector)
    }

    /// Returns the distinct values of `field` among documents matching `selector`.
    pub async fn distinct(&self, field: &str, selector: &Selector) -> ItemStoreResult<Vec<Bson>> {
        let backend = self.backend()?;
        let collection = self.collection_name(selector)?;
        let filter = self.resolve(selector)?;

        backend
            .distinct(&collection, field, filter)
            .await
    }

    /// Creates an index on the configured (or given) collection.
    pub async fn create_index(
        &self,
        collection: Option<&str>,
        keys: Document,
        spec: IndexSpec,
    ) -> ItemStoreResult<()> {
        let backend = self.backend()?;
        let collection = match collection {
            Some(name) => name.to_string(),
            None => self.collection_name(&Selector::new())?,
        };

        backend
            .create_index(&collection, keys, spec)
            .await
    }

    fn binding(&self) -> ItemStoreResult<&Binding> {
        self.binding
            .as_ref()
            .ok_or_else(|| ItemStoreError::Configuration("manager is not initialized".into()))
    }

    fn backend(&self) -> ItemStoreResult<&dyn StoreBackend> {
        Ok(&*self.binding()?.backend)
    }

    fn resolver(&self) -> ItemStoreResult<ParamResolver<'_>> {
        Ok(ParamResolver::new(
            &*self.binding()?.caster,
            &self.config.identity_field,
        ))
    }

    /// The call's collection, falling back to the configured one.
    fn collection_name(&self, selector: &Selector) -> ItemStoreResult<String> {
        selector
            .collection
            .clone()
            .or_else(|| self.config.collection.clone())
            .ok_or_else(|| ItemStoreError::Configuration("no collection configured".into()))
    }
}

impl fmt::Debug for ItemManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemManager")
            .field("config", &self.config)
            .field("backend", &self.binding.as_ref().map(|b| &b.backend))
            .field("notifier", &self.notifier)
            .finish()
    }
}
