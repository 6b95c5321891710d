//! User supplied hooks invoked by the manager.
//!
//! - [`ItemValidator`] runs after a single-document read and may transform or reject the item
//! - [`DeleteHook`] runs after a delete has been committed
//! - [`DataMapper`] transforms each document of a multi-document read
//!
//! Plain closures implement the hook traits, async work needs a manual implementation:
//!
//! ```ignore
//! use itemlayer::hooks::{DeleteHook, DeletedItem};
//! use itemlayer::error::HookResult;
//!
//! struct PurgeAttachments { /* ... */ }
//!
//! #[async_trait::async_trait]
//! impl DeleteHook for PurgeAttachments {
//!     async fn on_delete(&self, item: DeletedItem) -> HookResult<()> {
//!         // remove files owned by item.identity
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::sync::Arc;

use crate::error::HookResult;

/// Post-fetch validation of a single document.
#[async_trait]
pub trait ItemValidator: Send + Sync {
    /// Returns the (possibly transformed) item, or an error rejecting it.
    async fn validate(&self, item: Document) -> HookResult<Document>;
}

#[async_trait]
impl<F> ItemValidator for F
where
    F: Fn(Document) -> HookResult<Document> + Send + Sync,
{
    async fn validate(&self, item: Document) -> HookResult<Document> {
        self(item)
    }
}

/// What a [`DeleteHook`] learns about the deleted item.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedItem {
    /// The cast identifier of the delete call, if one was given.
    pub identity: Option<Bson>,
    /// A copy of the base filter of the delete call.
    pub find: Option<Document>,
}

/// Side effect executed after a document has been deleted.
#[async_trait]
pub trait DeleteHook: Send + Sync {
    async fn on_delete(&self, item: DeletedItem) -> HookResult<()>;
}

#[async_trait]
impl<F> DeleteHook for F
where
    F: Fn(DeletedItem) -> HookResult<()> + Send + Sync,
{
    async fn on_delete(&self, item: DeletedItem) -> HookResult<()> {
        self(item)
    }
}

/// Per-document transform applied while streaming a multi-document read.
pub type DataMapper = Arc<dyn Fn(Document) -> Document + Send + Sync>;
