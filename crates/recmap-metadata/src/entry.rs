use std::fmt;
use std::sync::Arc;

use recmap_convert::ConverterEntry;
use recmap_schema::{EmbedMode, FieldType};
use recmap_types::{ClassId, Entity};

use crate::polymorphism::PolymorphismTable;

/// How a field travels to storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConversionMode {
    /// A built-in converter.
    Scalar,
    /// A user converter, or an explicit converter binding.
    ConverterDefined,
    /// A nested mapping keyed by storage name.
    EmbedAsMap,
    /// An ordered list of field values.
    EmbedAsList,
    /// Only the referenced object's key.
    ReferenceByKey,
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scalar => "scalar",
            Self::ConverterDefined => "converter",
            Self::EmbedAsMap => "embed-map",
            Self::EmbedAsList => "embed-list",
            Self::ReferenceByKey => "reference",
        };
        f.write_str(name)
    }
}

/// The record class a nested value is converted through.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RecordTarget {
    /// Exactly this class.
    Concrete(ClassId),
    /// Any variant of this abstract record root; the discriminator travels
    /// with the value.
    Polymorphic(ClassId),
}

impl RecordTarget {
    pub fn class_id(&self) -> &ClassId {
        match self {
            Self::Concrete(id) | Self::Polymorphic(id) => id,
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self, Self::Polymorphic(_))
    }
}

/// Supported map key kinds. Keys are stored as strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Text,
    Int,
    Bool,
    Enum,
    Uuid,
}

impl KeyKind {
    pub(crate) fn from_field_type(ty: &FieldType) -> Option<Self> {
        match ty {
            FieldType::Text => Some(Self::Text),
            FieldType::Int => Some(Self::Int),
            FieldType::Bool => Some(Self::Bool),
            FieldType::Enum => Some(Self::Enum),
            FieldType::Uuid => Some(Self::Uuid),
            _ => None,
        }
    }
}

/// Resolved conversion for one value, recursively for collections.
#[derive(Clone, Debug)]
pub enum ValuePlan {
    /// Run a registered converter.
    Convert(ConverterEntry),
    Embed { target: RecordTarget, mode: EmbedMode },
    Reference { target: RecordTarget },
    /// Ordered sequence or set; each element follows the inner plan.
    List(Box<ValuePlan>),
    Map { key: KeyKind, value: Box<ValuePlan> },
}

impl ValuePlan {
    /// Mode of the innermost element plan.
    pub(crate) fn mode(&self) -> ConversionMode {
        match self {
            Self::Convert(entry) if entry.is_user_defined() => ConversionMode::ConverterDefined,
            Self::Convert(_) => ConversionMode::Scalar,
            Self::Embed {
                mode: EmbedMode::Map,
                ..
            } => ConversionMode::EmbedAsMap,
            Self::Embed {
                mode: EmbedMode::List,
                ..
            } => ConversionMode::EmbedAsList,
            Self::Reference { .. } => ConversionMode::ReferenceByKey,
            Self::List(inner) => inner.mode(),
            Self::Map { value, .. } => value.mode(),
        }
    }

    /// Visit every record target in this plan.
    pub(crate) fn for_each_target(&self, visit: &mut impl FnMut(&RecordTarget)) {
        match self {
            Self::Embed { target, .. } | Self::Reference { target } => visit(target),
            Self::List(inner) => inner.for_each_target(visit),
            Self::Map { value, .. } => value.for_each_target(visit),
            Self::Convert(_) => {}
        }
    }
}

/// One resolved field of a class.
#[derive(Clone, Debug)]
pub struct FieldMapping {
    pub name: String,
    pub storage_name: String,
    pub ty: FieldType,
    pub mode: ConversionMode,
    pub plan: ValuePlan,
    pub nullable: bool,
    pub key: bool,
}

/// The resolved, immutable schema for one class.
///
/// Entries are built once by the [`MetadataCache`](crate::MetadataCache)
/// and shared as `Arc`s. Nested record targets are named by id and looked up
/// through the cache, so self-referencing classes are representable.
pub struct ClassMetadataEntry {
    pub(crate) id: ClassId,
    pub(crate) namespace: Option<String>,
    pub(crate) set: Option<String>,
    pub(crate) ttl: u32,
    pub(crate) durable_delete: bool,
    pub(crate) send_key: bool,
    pub(crate) fields: Vec<FieldMapping>,
    pub(crate) key_index: Option<usize>,
    pub(crate) discriminator: Option<String>,
    pub(crate) polymorphism: Option<Arc<PolymorphismTable>>,
    pub(crate) factory: Option<fn() -> Box<dyn Entity>>,
}

impl ClassMetadataEntry {
    pub fn id(&self) -> &ClassId {
        &self.id
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn set(&self) -> Option<&str> {
        self.set.as_deref()
    }

    /// Record time-to-live in seconds; `0` means no expiry.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn durable_delete(&self) -> bool {
        self.durable_delete
    }

    pub fn send_key(&self) -> bool {
        self.send_key
    }

    /// Field mappings in declaration order.
    pub fn fields(&self) -> &[FieldMapping] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn key_field(&self) -> Option<&FieldMapping> {
        self.key_index.map(|i| &self.fields[i])
    }

    /// Discriminator written with every stored instance, if this class is a
    /// variant of an abstract record root.
    pub fn discriminator(&self) -> Option<&str> {
        self.discriminator.as_deref()
    }

    /// Variant table, present on abstract record roots.
    pub fn polymorphism(&self) -> Option<&PolymorphismTable> {
        self.polymorphism.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.factory.is_none()
    }

    /// A default-constructed instance; `None` for abstract roots.
    pub fn instantiate(&self) -> Option<Box<dyn Entity>> {
        self.factory.map(|factory| factory())
    }
}

impl fmt::Debug for ClassMetadataEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassMetadataEntry")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("set", &self.set)
            .field("ttl", &self.ttl)
            .field("fields", &self.fields.len())
            .field("key", &self.key_field().map(|f| &f.name))
            .field("discriminator", &self.discriminator)
            .field("abstract", &self.is_abstract())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recmap_convert::ConverterRegistry;
    use recmap_types::TypeTag;

    fn int_plan() -> ValuePlan {
        let registry = ConverterRegistry::new();
        ValuePlan::Convert(registry.lookup(&TypeTag::INT).unwrap())
    }

    #[test]
    fn mode_of_collections_is_element_mode() {
        let target = RecordTarget::Concrete(ClassId::new("app::Address"));
        let plan = ValuePlan::List(Box::new(ValuePlan::Embed {
            target,
            mode: EmbedMode::List,
        }));
        assert_eq!(plan.mode(), ConversionMode::EmbedAsList);
        assert_eq!(int_plan().mode(), ConversionMode::Scalar);
    }

    #[test]
    fn targets_are_found_through_maps() {
        let plan = ValuePlan::Map {
            key: KeyKind::Text,
            value: Box::new(ValuePlan::Reference {
                target: RecordTarget::Polymorphic(ClassId::new("Shape")),
            }),
        };
        let mut seen = Vec::new();
        plan.for_each_target(&mut |t| seen.push(t.clone()));
        assert_eq!(seen, vec![RecordTarget::Polymorphic(ClassId::new("Shape"))]);
    }

    #[test]
    fn key_kinds() {
        assert_eq!(KeyKind::from_field_type(&FieldType::Uuid), Some(KeyKind::Uuid));
        assert_eq!(KeyKind::from_field_type(&FieldType::Float), None);
        assert_eq!(KeyKind::from_field_type(&FieldType::Timestamp), None);
    }
}
