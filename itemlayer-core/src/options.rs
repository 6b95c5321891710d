//! Per-operation options.
//!
//! Every manager call takes an explicit options value instead of a loosely typed
//! parameter bag. All of them share a [`Selector`] describing which documents the
//! call targets; unset fields fall back to the manager's
//! [`ManagerConfig`](crate::config::ManagerConfig).
//!
//! ```ignore
//! use itemlayer::options::{ReadOptions, Selector, UpdateOptions};
//! use bson::doc;
//!
//! let read = ReadOptions::new(Selector::by_id("65f0c0ffee00000000000001"));
//! let update = UpdateOptions::new(Selector::by_id("65f0c0ffee00000000000001"))
//!     .set(doc! { "name": "b" });
//! ```

use bson::{Bson, Document};
use std::sync::Arc;

use crate::{
    backend::{CursorOp, WriteFlags},
    hooks::{DataMapper, DeleteHook, ItemValidator},
};

/// Which documents a call targets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    /// Base filter.
    pub find: Option<Document>,
    /// A single identifier, native or textual.
    pub id: Option<Bson>,
    /// A set of identifiers, native or textual.
    pub ids: Option<Vec<Bson>>,
    /// Target collection, overriding the configured one.
    pub collection: Option<String>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets the document with identifier `id`.
    pub fn by_id(id: impl Into<Bson>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Targets the documents whose identifier is one of `ids`.
    pub fn by_ids<I, V>(ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        Self {
            ids: Some(ids.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Targets the documents matching `filter`.
    pub fn by_filter(filter: Document) -> Self {
        Self {
            find: Some(filter),
            ..Self::default()
        }
    }

    /// Sets the base filter.
    pub fn find(mut self, filter: Document) -> Self {
        self.find = Some(filter);
        self
    }

    /// Sets the single identifier.
    pub fn id(mut self, id: impl Into<Bson>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the target collection.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }
}

/// Options for `get_one`, `get_many` and `get_path`.
#[derive(Clone, Default)]
pub struct ReadOptions {
    pub selector: Selector,
    /// Sort key document for multi-document reads.
    pub sort: Option<Document>,
    /// Maximum number of documents for multi-document reads.
    pub limit: Option<i64>,
    /// Additional cursor shaping operations, applied after `sort` and `limit`.
    pub modifiers: Vec<CursorOp>,
    /// Overrides the configured auto-insert policy.
    pub auto_insert: Option<bool>,
    /// Post-fetch validation for single-document reads.
    pub validate: Option<Arc<dyn ItemValidator>>,
    /// Per-document transform for multi-document reads.
    pub on_data: Option<DataMapper>,
}

impl ReadOptions {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            ..Self::default()
        }
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn modifier(mut self, op: CursorOp) -> Self {
        self.modifiers.push(op);
        self
    }

    pub fn auto_insert(mut self, auto_insert: bool) -> Self {
        self.auto_insert = Some(auto_insert);
        self
    }

    pub fn validate(mut self, validator: impl ItemValidator + 'static) -> Self {
        self.validate = Some(Arc::new(validator));
        self
    }

    pub fn on_data<F>(mut self, mapper: F) -> Self
    where
        F: Fn(Document) -> Document + Send + Sync + 'static,
    {
        self.on_data = Some(Arc::new(mapper));
        self
    }
}

impl From<Selector> for ReadOptions {
    fn from(selector: Selector) -> Self {
        ReadOptions::new(selector)
    }
}

/// Options for `update` and `set_path`.
#[derive(Clone, Default)]
pub struct UpdateOptions {
    pub selector: Selector,
    /// Base fields of the document when the write upserts.
    pub payload: Option<Document>,
    /// Explicit `$set` fields, authoritative over `payload`.
    pub set: Option<Document>,
    /// Explicit `$unset` fields.
    pub unset: Option<Document>,
    /// Overrides the configured write flags. Ignored when auto-insert is on.
    pub flags: Option<WriteFlags>,
    /// Overrides the configured auto-insert policy.
    pub auto_insert: Option<bool>,
    /// Validation applied by the existence check and the post-write re-fetch.
    pub validate: Option<Arc<dyn ItemValidator>>,
}

impl UpdateOptions {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            ..Self::default()
        }
    }

    pub fn payload(mut self, payload: Document) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn set(mut self, set: Document) -> Self {
        self.set = Some(set);
        self
    }

    pub fn unset(mut self, unset: Document) -> Self {
        self.unset = Some(unset);
        self
    }

    pub fn flags(mut self, flags: WriteFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn upsert(mut self) -> Self {
        self.flags = Some(WriteFlags {
            upsert: true,
            ..self.flags.unwrap_or_default()
        });
        self
    }

    pub fn auto_insert(mut self, auto_insert: bool) -> Self {
        self.auto_insert = Some(auto_insert);
        self
    }

    pub fn validate(mut self, validator: impl ItemValidator + 'static) -> Self {
        self.validate = Some(Arc::new(validator));
        self
    }

    /// The single-document read an update performs before and after writing.
    ///
    /// Auto-insert is always off for these reads.
    pub(crate) fn read_options(&self) -> ReadOptions {
        ReadOptions {
            selector: self.selector.clone(),
            auto_insert: Some(false),
            validate: self.validate.clone(),
            ..ReadOptions::default()
        }
    }
}

/// Options for `delete_one`.
#[derive(Clone, Default)]
pub struct DeleteOptions {
    pub selector: Selector,
    /// Overrides the configured write flags.
    pub flags: Option<WriteFlags>,
    /// Side effect run once the deletion is committed.
    pub on_delete_item: Option<Arc<dyn DeleteHook>>,
}

impl DeleteOptions {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            ..Self::default()
        }
    }

    pub fn flags(mut self, flags: WriteFlags) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn on_delete_item(mut self, hook: impl DeleteHook + 'static) -> Self {
        self.on_delete_item = Some(Arc::new(hook));
        self
    }
}

impl From<Selector> for DeleteOptions {
    fn from(selector: Selector) -> Self {
        DeleteOptions::new(selector)
    }
}
