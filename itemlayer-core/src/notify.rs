//! Per-manager change notifications.
//!
//! Each [`ItemManager`](crate::manager::ItemManager) owns one [`ChangeNotifier`].
//! Handlers subscribed when an event is published receive it; there is no buffering
//! or replay for late subscribers.

use bson::Document;
use mea::rwlock::RwLock;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

/// Name of the event published after a successful update.
pub const ITEM_UPDATED: &str = "itemUpdated";

#[derive(Debug, Clone, PartialEq)]
pub enum ItemEvent {
    /// An item was updated; carries the re-fetched document.
    Updated {
        collection: String,
        item: Document,
    },
}

impl ItemEvent {
    /// Returns the event name.
    pub fn name(&self) -> &'static str {
        match self {
            ItemEvent::Updated { .. } => ITEM_UPDATED,
        }
    }

    /// Returns the document carried by the event.
    pub fn item(&self) -> &Document {
        match self {
            ItemEvent::Updated { item, .. } => item,
        }
    }
}

/// A subscribed event handler.
pub type EventHandler = Arc<dyn Fn(&ItemEvent) + Send + Sync>;

/// Handle returned by [`ChangeNotifier::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct ChangeNotifier {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, EventHandler)>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Registers `handler` for all subsequently published events.
    pub async fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ItemEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        self.handlers
            .write()
            .await
            .push((id, Arc::new(handler)));

        id
    }

    /// Removes a handler. Returns `false` if it was not subscribed.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().await;
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);

        handlers.len() != before
    }

    /// Delivers `event` to every current subscriber and returns how many were called.
    pub async fn publish(&self, event: &ItemEvent) -> usize {
        // Snapshot so handlers run without the lock held.
        let handlers = self
            .handlers
            .read()
            .await
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect::<Vec<_>>();

        for handler in &handlers {
            handler(event);
        }

        handlers.len()
    }

    /// Returns the number of current subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}
