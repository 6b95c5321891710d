//! Filter resolution from a [`Selector`].
//!
//! The resolver merges the identity inputs of a selector into its base filter:
//!
//! - `id` is cast and written under the identity field, replacing whatever the base
//!   filter had there
//! - otherwise `ids` are cast and written as `{ identity: { "$in": [...] } }`
//! - otherwise the base filter is returned unchanged
//!
//! Other predicates of the base filter are always preserved. Resolution performs no I/O.

use bson::{Bson, Document, doc};
use tracing::warn;

use crate::{
    error::ItemStoreResult,
    ident::IdentifierCaster,
    options::Selector,
};

pub struct ParamResolver<'a> {
    caster: &'a dyn IdentifierCaster,
    identity_field: &'a str,
}

impl<'a> ParamResolver<'a> {
    pub fn new(caster: &'a dyn IdentifierCaster, identity_field: &'a str) -> Self {
        Self { caster, identity_field }
    }

    /// Builds the concrete filter for `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::InvalidIdentifier`](crate::error::ItemStoreError::InvalidIdentifier)
    /// if any identifier fails to cast.
    pub fn resolve(&self, selector: &Selector) -> ItemStoreResult<Document> {
        let mut filter = selector.find.clone().unwrap_or_default();

        if let Some(id) = &selector.id {
            if selector.ids.is_some() {
                warn!(
                    identity_field = self.identity_field,
                    "both id and ids supplied, resolving by id"
                );
            }

            filter.insert(self.identity_field, self.caster.cast(id)?);
        } else if let Some(ids) = &selector.ids {
            filter.insert(
                self.identity_field,
                doc! { "$in": self.caster.cast_many(ids)? },
            );
        }

        Ok(filter)
    }

    /// Casts the selector's single identifier, if it has one.
    pub fn resolve_identity(&self, selector: &Selector) -> ItemStoreResult<Option<Bson>> {
        selector
            .id
            .as_ref()
            .map(|id| self.caster.cast(id))
            .transpose()
    }
}
