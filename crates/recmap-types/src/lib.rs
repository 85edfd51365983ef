//! Foundation types for recmap.
//!
//! This crate provides the two value universes the mapper moves between and
//! the identities used to name classes and converters. Every other recmap
//! crate depends on `recmap-types`.
//!
//! # Key Types
//!
//! - [`StorageValue`]: wire-level value: scalar, list, string-keyed map, or null
//! - [`StorageRecord`]: storage field name → [`StorageValue`] mapping
//! - [`Value`]: in-memory domain value read from and written to entities
//! - [`Entity`]: field access surface every mappable class implements
//! - [`ClassId`]: stable class identity
//! - [`TypeTag`]: semantic type tag used to look up converters

pub mod class;
pub mod entity;
pub mod error;
pub mod macros;
pub mod storage;
pub mod value;

pub use class::{ClassId, TypeTag};
pub use entity::{downcast, Entity};
pub use error::{ValueError, ValueResult};
pub use storage::{StorageRecord, StorageValue, TYPE_KEY};
pub use value::{Bytes, CustomValue, FromValue, IntoValue, Value};
