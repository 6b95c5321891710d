//! Conversion of external identifier representations into native store identifiers.
//!
//! Identifiers reach the manager either already in the store's native form (any
//! non-string [`Bson`] value) or as text that has to be cast. Casting is pure and
//! fail-closed: a string the native type rejects yields
//! [`ItemStoreError::InvalidIdentifier`].
//!
//! Any `Fn(&str) -> Option<Bson>` closure can act as a caster:
//!
//! ```ignore
//! use itemlayer::ident::IdentifierCaster;
//! use bson::Bson;
//!
//! let caster = |value: &str| value.parse::<i64>().ok().map(Bson::Int64);
//! assert_eq!(caster.cast(&Bson::String("42".into())).unwrap(), Bson::Int64(42));
//! ```

use bson::{Bson, oid::ObjectId};

use crate::error::{ItemStoreError, ItemStoreResult};

/// Casts external identifiers to the store's native identifier type.
pub trait IdentifierCaster: Send + Sync {
    /// Converts the textual form of an identifier, returning `None` when it is malformed.
    fn cast_str(&self, value: &str) -> Option<Bson>;

    /// Casts a single identifier.
    ///
    /// Non-string values are returned unchanged, they are assumed to be native already.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::InvalidIdentifier`] if a string value cannot be cast.
    fn cast(&self, value: &Bson) -> ItemStoreResult<Bson> {
        match value {
            Bson::String(text) => self
                .cast_str(text)
                .ok_or_else(|| ItemStoreError::InvalidIdentifier(text.clone())),
            other => Ok(other.clone()),
        }
    }

    /// Casts every identifier in order.
    ///
    /// The first failure aborts the whole cast; no partially cast list is ever returned.
    fn cast_many(&self, values: &[Bson]) -> ItemStoreResult<Vec<Bson>> {
        values
            .iter()
            .map(|value| self.cast(value))
            .collect()
    }
}

impl<F> IdentifierCaster for F
where
    F: Fn(&str) -> Option<Bson> + Send + Sync,
{
    fn cast_str(&self, value: &str) -> Option<Bson> {
        self(value)
    }
}

/// Casts 24 character hex strings to BSON ObjectIds, the identifier MongoDB generates for `_id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectIdCaster;

impl IdentifierCaster for ObjectIdCaster {
    fn cast_str(&self, value: &str) -> Option<Bson> {
        ObjectId::parse_str(value)
            .ok()
            .map(Bson::ObjectId)
    }
}

/// Casts UUID text (hyphenated or simple) to BSON binary UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidCaster;

impl IdentifierCaster for UuidCaster {
    fn cast_str(&self, value: &str) -> Option<Bson> {
        uuid::Uuid::parse_str(value)
            .ok()
            .map(|parsed| Bson::from(bson::Uuid::from(parsed)))
    }
}
