use recmap_schema::SchemaError;
use recmap_types::{ClassId, TypeTag};
use thiserror::Error;

/// A class cannot be resolved into a [`ClassMetadataEntry`](crate::ClassMetadataEntry).
///
/// Resolution failures are fatal for the class being resolved (and for every
/// class whose closure reaches it) but never leave a partial entry behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// The class was never registered in the catalog.
    #[error("unknown class: {0}")]
    UnknownClass(ClassId),

    /// No namespace on the class, its bases, or the mapper default.
    #[error("class {0} has no namespace and no default namespace is configured")]
    MissingNamespace(ClassId),

    #[error("class {class} declares more than one key field: {fields:?}")]
    DuplicateKeyField { class: ClassId, fields: Vec<String> },

    /// Key fields must convert to a single scalar.
    #[error("key field {class}.{field} has non-scalar type {ty}")]
    InvalidKeyType {
        class: ClassId,
        field: String,
        ty: String,
    },

    /// Mandatory embedding loops back on itself.
    #[error("cyclic embedding: {}", render_cycle(.path))]
    CyclicEmbedding { path: Vec<ClassId> },

    /// A field is bound to, or declared as, a type no converter handles.
    #[error("no converter for {tag} on {class}.{field}")]
    UnknownConverter {
        class: ClassId,
        field: String,
        tag: TypeTag,
    },

    /// An embed mode was requested on a field with no record type in it.
    #[error("field {class}.{field} of type {ty} cannot be embedded")]
    InvalidEmbedding {
        class: ClassId,
        field: String,
        ty: String,
    },

    /// A field names both a converter and an embed mode.
    #[error("field {class}.{field} sets both a converter and an embed mode")]
    ConflictingMapping { class: ClassId, field: String },

    /// A field references a record class that has no key field.
    #[error("field {class}.{field} references {target}, which has no key field")]
    UnkeyedReference {
        class: ClassId,
        field: String,
        target: ClassId,
    },

    #[error("discriminator {discriminator:?} under {base} is used by both {first} and {second}")]
    DuplicateDiscriminator {
        base: ClassId,
        discriminator: String,
        first: ClassId,
        second: ClassId,
    },

    /// An abstract record root with no registered concrete variants.
    #[error("record root {0} has no concrete variants")]
    NoVariants(ClassId),

    /// `implements` names a class that is not an abstract record root.
    #[error("class {class} implements {base}, which is not an abstract record root")]
    NotAbstract { class: ClassId, base: ClassId },

    /// Map keys must be text, int, bool, enum or uuid.
    #[error("field {class}.{field} has unsupported map key type {ty}")]
    UnsupportedMapKey {
        class: ClassId,
        field: String,
        ty: String,
    },

    #[error("class {class} declares field {field} more than once")]
    DuplicateField { class: ClassId, field: String },

    #[error("class {class} stores two fields under {name:?}")]
    DuplicateStorageName { class: ClassId, name: String },

    /// A field uses the reserved discriminator bin name.
    #[error("field {class}.{field} uses the reserved storage name \"@type\"")]
    ReservedStorageName { class: ClassId, field: String },

    /// Applying schema overrides failed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

fn render_cycle(path: &[ClassId]) -> String {
    path.iter()
        .map(ClassId::simple_name)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result alias for metadata resolution.
pub type MetadataResult<T> = Result<T, MetadataError>;

/// A structured configuration document could not be applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Unknown or ambiguous class name, unknown field, or parse failure.
    #[error("configuration error: {0}")]
    Schema(#[from] SchemaError),

    /// The class was resolved before its configuration arrived.
    #[error("class {0} is already resolved; configuration cannot replace it")]
    AlreadyResolved(ClassId),

    /// The document configures the same class twice.
    #[error("class {0} is configured more than once")]
    DuplicateEntry(ClassId),

    /// The configured class failed to resolve.
    #[error("configured class {class} is invalid: {source}")]
    Invalid {
        class: ClassId,
        #[source]
        source: MetadataError,
    },
}

/// Result alias for configuration loading.
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;

/// Errors raised while converting between objects and storage records.
///
/// `path` locates the failing value, e.g. `Container.children[1].name`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// The object has no key field, or its key value is null.
    #[error("{path}: {class} has no key value")]
    MissingKey { class: ClassId, path: String },

    /// A stored discriminator is absent from the polymorphism table.
    #[error("{path}: unknown discriminator {discriminator:?} for {base}")]
    UnknownVariant {
        base: ClassId,
        discriminator: String,
        path: String,
    },

    /// The runtime class of a value is not the declared class or one of its
    /// variants.
    #[error("{path}: expected {expected}, found {found}")]
    ClassMismatch {
        expected: ClassId,
        found: ClassId,
        path: String,
    },

    /// A storage value is incompatible with the field's conversion.
    #[error("{path}: cannot hydrate: {reason}")]
    Hydration { path: String, reason: String },

    /// A domain value is incompatible with the field's conversion.
    #[error("{path}: cannot convert: {reason}")]
    Conversion { path: String, reason: String },

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl MappingError {
    pub(crate) fn hydration(reason: impl ToString) -> Self {
        Self::Hydration {
            path: String::new(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn conversion(reason: impl ToString) -> Self {
        Self::Conversion {
            path: String::new(),
            reason: reason.to_string(),
        }
    }

    /// Prefix the error path with an enclosing segment: a field name, an
    /// `[index]`, or a class name.
    pub(crate) fn within(mut self, segment: &str) -> Self {
        let path = match &mut self {
            Self::MissingKey { path, .. }
            | Self::UnknownVariant { path, .. }
            | Self::ClassMismatch { path, .. }
            | Self::Hydration { path, .. }
            | Self::Conversion { path, .. } => path,
            Self::Metadata(_) => return self,
        };
        *path = if path.is_empty() || path.starts_with('[') {
            format!("{segment}{path}")
        } else {
            format!("{segment}.{path}")
        };
        self
    }

    /// Location of the failing value, if the error has one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::MissingKey { path, .. }
            | Self::UnknownVariant { path, .. }
            | Self::ClassMismatch { path, .. }
            | Self::Hydration { path, .. }
            | Self::Conversion { path, .. } => Some(path),
            Self::Metadata(_) => None,
        }
    }
}

/// Result alias for object/record conversion.
pub type MappingResult<T> = Result<T, MappingError>;
