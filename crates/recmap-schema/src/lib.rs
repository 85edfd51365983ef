//! Declarative class schemas for recmap.
//!
//! A schema is the language-neutral description the metadata engine works
//! from: namespace and set, key field, time-to-live, delete and send-key
//! flags, per-field types and conversion rules, and the record bases a class
//! implements. Schemas come from two places:
//!
//! - in-language, via [`Record::schema`], registered in a [`ClassCatalog`]
//! - a structured [`MapperConfig`] document whose entries override them
//!
//! # Modules
//!
//! - [`field`]: [`FieldType`], [`FieldDecl`], [`EmbedMode`]
//! - [`schema`]: [`ClassSchema`] and the [`Record`] trait
//! - [`catalog`]: [`ClassCatalog`], the set of classes the mapper can see
//! - [`config`]: [`MapperConfig`] and its TOML loader
//! - [`error`]: [`SchemaError`]

pub mod catalog;
pub mod config;
pub mod error;
pub mod field;
pub mod schema;

pub use catalog::{ClassCatalog, ClassDescriptor, ClassKind};
pub use config::{ClassConfig, FieldConfig, MapperConfig};
pub use error::{SchemaError, SchemaResult};
pub use field::{EmbedMode, FieldDecl, FieldType};
pub use schema::{ClassSchema, Record};
