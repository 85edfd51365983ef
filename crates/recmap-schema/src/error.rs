use recmap_types::ClassId;
use thiserror::Error;

/// Errors from schema declaration, catalog registration and configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The class is already present in the catalog.
    #[error("class already registered: {0}")]
    DuplicateClass(ClassId),

    /// The catalog no longer accepts classes.
    #[error("class catalog is sealed; cannot register {0}")]
    CatalogSealed(ClassId),

    /// A configuration entry names a class the catalog does not know.
    #[error("class not found: {0}")]
    ClassNotFound(String),

    /// A configuration name matches more than one class by simple name.
    #[error("class name {name} is ambiguous: {candidates:?}")]
    AmbiguousClass { name: String, candidates: Vec<ClassId> },

    /// A configuration override names a field the class does not declare.
    #[error("class {class} has no field {field}")]
    UnknownField { class: ClassId, field: String },

    /// The configuration document could not be parsed.
    #[error("configuration parse error: {0}")]
    Parse(String),
}

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
