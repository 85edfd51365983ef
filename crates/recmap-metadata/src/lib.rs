//! Class metadata resolution and object/record conversion for recmap.
//!
//! The [`MetadataCache`] turns a class's declared schema into an immutable
//! [`ClassMetadataEntry`], once per class, and drives conversion between
//! [`Entity`](recmap_types::Entity) objects and
//! [`StorageRecord`](recmap_types::StorageRecord)s with it.
//!
//! # Modules
//!
//! - [`entry`]: [`ClassMetadataEntry`], [`FieldMapping`], [`ConversionMode`]
//! - [`polymorphism`]: [`PolymorphismTable`] for abstract record roots
//! - [`cache`]: [`MetadataCache`], lazy and configuration-driven loading
//! - [`convert`]: `to_storage`, `key_of`, `from_storage` and
//!   [`ReferenceLoader`]
//! - [`error`]: [`MetadataError`], [`ConfigurationError`], [`MappingError`]

mod build;
pub mod cache;
pub mod convert;
pub mod entry;
pub mod error;
pub mod polymorphism;
mod resolver;

#[cfg(test)]
mod testing;

pub use cache::{LoadReport, MetadataCache};
pub use convert::{ReferenceLoader, StubLoader};
pub use entry::{ClassMetadataEntry, ConversionMode, FieldMapping, KeyKind, RecordTarget, ValuePlan};
pub use error::{
    ConfigurationError, ConfigurationResult, MappingError, MappingResult, MetadataError,
    MetadataResult,
};
pub use polymorphism::PolymorphismTable;
