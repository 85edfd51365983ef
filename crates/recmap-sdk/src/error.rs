use thiserror::Error;

use recmap_convert::RegistryError;
use recmap_metadata::{ConfigurationError, MappingError, MetadataError};
use recmap_schema::SchemaError;
use recmap_types::ValueError;

/// Errors from record store operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// The key value cannot address a record.
    #[error("invalid user key: {0}")]
    InvalidKey(String),

    /// Storage backend is read-only or otherwise unavailable.
    #[error("store is read-only")]
    ReadOnly,

    /// Failure reported by the backend.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("converter registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("value error: {0}")]
    Value(#[from] ValueError),
}

pub type SdkResult<T> = Result<T, SdkError>;
