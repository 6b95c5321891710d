//! Error types and result types for item manager operations.
//!
//! Every operation of the [`ItemManager`](crate::manager::ItemManager) returns an
//! [`ItemStoreResult<T>`]. Failures coming from the underlying store are surfaced
//! unchanged as [`ItemStoreError::Store`].

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur while resolving or executing an item operation.
#[derive(Error, Debug)]
pub enum ItemStoreError {
    /// A string identifier could not be cast to the store's native identifier type.
    #[error("invalid id '{0}'")]
    InvalidIdentifier(String),
    /// An update targeted a document that does not exist and auto-insert was off.
    #[error("{0}")]
    NotFound(String),
    /// An error surfaced by the underlying store.
    #[error("Store error: {0}")]
    Store(String),
    /// The configured validation hook rejected a fetched document.
    #[error("Validation failure: {0}")]
    ValidationFailure(String),
    /// The configured pre-delete hook failed.
    #[error("Hook failure: {0}")]
    HookFailure(String),
    /// The manager is missing configuration or was used before `init`.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A specialized `Result` type for item manager operations.
pub type ItemStoreResult<T> = Result<T, ItemStoreError>;

/// Error type returned by user supplied hooks (validation, pre-delete).
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by user supplied hooks.
pub type HookResult<T> = Result<T, HookError>;

impl From<BsonError> for ItemStoreError {
    fn from(err: BsonError) -> Self {
        ItemStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for ItemStoreError {
    fn from(err: SerdeJsonError) -> Self {
        ItemStoreError::Serialization(err.to_string())
    }
}
