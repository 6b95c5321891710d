//! Instance configuration for an [`ItemManager`](crate::manager::ItemManager).
//!
//! The configuration carries the defaults every call is merged with. Call-site
//! options always win over these values.
//!
//! ```ignore
//! use itemlayer::config::ManagerConfig;
//!
//! let config = ManagerConfig::from_json_str(r#"{ "collection": "users", "auto_insert": true }"#)?;
//! assert_eq!(config.identity_field, "_id");
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    backend::WriteFlags,
    error::{ItemStoreError, ItemStoreResult},
};

/// Default name of the identity field.
pub const DEFAULT_IDENTITY_FIELD: &str = "_id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Collection used when a call does not name one.
    pub collection: Option<String>,
    /// Field holding each document's identifier.
    pub identity_field: String,
    /// Insert a document built from the filter when a single-document read misses.
    pub auto_insert: bool,
    /// Write flags used by updates that do not specify their own.
    pub flags: WriteFlags,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            collection: None,
            identity_field: DEFAULT_IDENTITY_FIELD.to_string(),
            auto_insert: false,
            flags: WriteFlags::default(),
        }
    }
}

impl ManagerConfig {
    /// Creates a configuration targeting `collection` with all other values defaulted.
    pub fn for_collection(collection: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            ..Self::default()
        }
    }

    /// Enables or disables auto-insert by default.
    pub fn with_auto_insert(mut self, auto_insert: bool) -> Self {
        self.auto_insert = auto_insert;
        self
    }

    /// Sets the identity field name.
    pub fn with_identity_field(mut self, field: impl Into<String>) -> Self {
        self.identity_field = field.into();
        self
    }

    /// Parses a configuration from JSON. Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns [`ItemStoreError::Serialization`] for malformed JSON and
    /// [`ItemStoreError::Configuration`] if the result fails [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> ItemStoreResult<Self> {
        let config: ManagerConfig = serde_json::from_str(json)?;
        config.validate()?;

        Ok(config)
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> ItemStoreResult<()> {
        if self.identity_field.is_empty() {
            return Err(ItemStoreError::Configuration("identity field must not be empty".into()));
        }
        if matches!(&self.collection, Some(name) if name.is_empty()) {
            return Err(ItemStoreError::Configuration("collection name must not be empty".into()));
        }

        Ok(())
    }
}
