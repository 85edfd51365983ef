use std::fmt;

use recmap_types::{ClassId, TypeTag};
use serde::{Deserialize, Serialize};

/// How a nested record is flattened into its parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    /// Nested mapping keyed by storage name.
    #[default]
    Map,
    /// Ordered list of field values in declaration order.
    List,
}

impl fmt::Display for EmbedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Map => write!(f, "map"),
            Self::List => write!(f, "list"),
        }
    }
}

/// Declared (semantic) type of a field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Timestamp,
    Date,
    Uuid,
    Enum,
    /// Ordered sequence.
    List(Box<FieldType>),
    /// Unordered unique collection; stored like a list.
    Set(Box<FieldType>),
    /// Key-unique mapping.
    Map(Box<FieldType>, Box<FieldType>),
    /// Another record class, concrete or an abstract record root.
    Record(ClassId),
    /// A type handled only by a user converter.
    Custom(TypeTag),
}

impl FieldType {
    pub fn list(element: FieldType) -> Self {
        Self::List(Box::new(element))
    }

    pub fn set(element: FieldType) -> Self {
        Self::Set(Box::new(element))
    }

    pub fn map(key: FieldType, value: FieldType) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    /// A concrete record type.
    pub fn record<T: 'static>() -> Self {
        Self::Record(ClassId::of::<T>())
    }

    /// A record type named by id (abstract roots).
    pub fn record_id(id: impl Into<ClassId>) -> Self {
        Self::Record(id.into())
    }

    pub fn custom(tag: impl Into<TypeTag>) -> Self {
        Self::Custom(tag.into())
    }

    /// The semantic tag used for converter lookup.
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Bool => TypeTag::BOOL,
            Self::Int => TypeTag::INT,
            Self::Float => TypeTag::FLOAT,
            Self::Text => TypeTag::TEXT,
            Self::Bytes => TypeTag::BYTES,
            Self::Timestamp => TypeTag::TIMESTAMP,
            Self::Date => TypeTag::DATE,
            Self::Uuid => TypeTag::UUID,
            Self::Enum => TypeTag::ENUM,
            Self::Custom(tag) => tag.clone(),
            other => TypeTag::new(other.to_string()),
        }
    }

    /// Built-in scalar types (handled by a built-in converter).
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            Self::List(_) | Self::Set(_) | Self::Map(..) | Self::Record(_) | Self::Custom(_)
        )
    }

    /// The record class at the bottom of this type, through collections.
    pub fn record_class(&self) -> Option<&ClassId> {
        match self {
            Self::Record(id) => Some(id),
            Self::List(e) | Self::Set(e) | Self::Map(_, e) => e.record_class(),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(e) => write!(f, "list<{e}>"),
            Self::Set(e) => write!(f, "set<{e}>"),
            Self::Map(k, v) => write!(f, "map<{k},{v}>"),
            Self::Record(id) => write!(f, "{id}"),
            Self::Custom(tag) => write!(f, "{tag}"),
            scalar => write!(f, "{}", scalar.tag()),
        }
    }
}

/// One declared field of a class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDecl {
    /// Rust field name, as known to [`Entity`](recmap_types::Entity).
    pub name: String,
    /// Storage name; defaults to `name`.
    pub storage_name: Option<String>,
    pub ty: FieldType,
    /// Explicit embedding request.
    pub embed: Option<EmbedMode>,
    /// Explicit converter binding by tag.
    pub converter: Option<TypeTag>,
    pub nullable: bool,
    /// Supplies the record key.
    pub key: bool,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            storage_name: None,
            ty,
            embed: None,
            converter: None,
            nullable: false,
            key: false,
        }
    }

    pub fn storage_name(mut self, name: impl Into<String>) -> Self {
        self.storage_name = Some(name.into());
        self
    }

    pub fn embed(mut self, mode: EmbedMode) -> Self {
        self.embed = Some(mode);
        self
    }

    pub fn converter(mut self, tag: impl Into<TypeTag>) -> Self {
        self.converter = Some(tag.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    /// The name this field is stored under.
    pub fn effective_storage_name(&self) -> &str {
        self.storage_name.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Address;

    #[test]
    fn scalar_tags_are_builtin_tags() {
        assert_eq!(FieldType::Int.tag(), TypeTag::INT);
        assert_eq!(FieldType::Timestamp.tag(), TypeTag::TIMESTAMP);
        assert_eq!(FieldType::custom("money").tag(), TypeTag::new("money"));
    }

    #[test]
    fn collection_tags_describe_structure() {
        let ty = FieldType::map(FieldType::Text, FieldType::list(FieldType::Int));
        assert_eq!(ty.tag(), TypeTag::new("map<text,list<int>>"));
    }

    #[test]
    fn record_class_looks_through_collections() {
        let ty = FieldType::list(FieldType::record::<Address>());
        assert_eq!(ty.record_class(), Some(&ClassId::of::<Address>()));
        assert!(FieldType::list(FieldType::Int).record_class().is_none());
    }

    #[test]
    fn scalar_classification() {
        assert!(FieldType::Uuid.is_scalar());
        assert!(!FieldType::set(FieldType::Int).is_scalar());
        assert!(!FieldType::custom("money").is_scalar());
    }

    #[test]
    fn storage_name_defaults_to_field_name() {
        let plain = FieldDecl::new("first_name", FieldType::Text);
        assert_eq!(plain.effective_storage_name(), "first_name");
        let renamed = plain.storage_name("fn");
        assert_eq!(renamed.effective_storage_name(), "fn");
    }

    #[test]
    fn builder_sets_flags() {
        let decl = FieldDecl::new("id", FieldType::Int).key().nullable();
        assert!(decl.key);
        assert!(decl.nullable);
        assert!(decl.embed.is_none());
    }

    #[test]
    fn embed_mode_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: EmbedMode,
        }
        let w: Wrapper = toml::from_str(r#"mode = "list""#).unwrap();
        assert_eq!(w.mode, EmbedMode::List);
    }
}
