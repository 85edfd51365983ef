//! High-level API for recmap.
//!
//! A [`Mapper`] owns the class metadata cache and a [`RecordStore`], and
//! offers typed `save`, `read` and `delete` on top of the object ⇄ record
//! conversion primitives. Build one with [`MapperBuilder`]: register
//! converters and classes first, since the first class resolution seals
//! both registries.

pub mod error;
pub mod mapper;
pub mod store;

pub use error::{SdkError, SdkResult, StoreError, StoreResult};
pub use mapper::{Mapper, MapperBuilder};
pub use store::{InMemoryRecordStore, RecordKey, RecordStore, UserKey, WritePolicy};

// Re-export the types applications declare and receive.
pub use recmap_convert::{Converter, ConvertError, ConvertResult, TypedConverter};
pub use recmap_metadata::{ClassMetadataEntry, ConfigurationError, LoadReport, MappingError, MetadataError};
pub use recmap_schema::{
    ClassConfig, ClassSchema, EmbedMode, FieldConfig, FieldDecl, FieldType, MapperConfig, Record,
};
pub use recmap_types::{
    entity, value_enum, ClassId, Entity, FromValue, IntoValue, StorageRecord, StorageValue, Value,
};
