//! Type converters and the converter registry.
//!
//! A converter moves one semantic type between its domain form
//! ([`Value`](recmap_types::Value)) and its storage form
//! ([`StorageValue`](recmap_types::StorageValue)). Converters are looked up by
//! the declared field's [`TypeTag`](recmap_types::TypeTag), never by the
//! runtime type of a value.
//!
//! # Registry Rules
//!
//! 1. Built-in converters (scalars, temporal types, uuids, enums) exist from
//!    construction.
//! 2. A user converter may shadow a built-in tag.
//! 3. Two user converters for one tag are an error; the first one stays.
//! 4. Once sealed (first class resolution) the registry rejects writes.

pub mod builtin;
pub mod converter;
pub mod error;
pub mod registry;

pub use converter::{Converter, Typed, TypedConverter};
pub use error::{ConvertError, ConvertResult, RegistryError, RegistryResult};
pub use registry::{ConverterEntry, ConverterOrigin, ConverterRegistry};
