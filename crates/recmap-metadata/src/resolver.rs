//! Field-level type resolution.
//!
//! For each declared field the resolver picks one conversion pipeline, in
//! this order:
//!
//! 1. an explicit converter binding on the field
//! 2. an explicit embed mode (record types, element-wise through collections)
//! 3. a user converter registered for the field's semantic type
//! 4. a record type: reference by key
//! 5. collections and maps, element by element
//! 6. a built-in scalar converter
//!
//! A field may bind a converter or an embed mode, not both.

use std::collections::HashSet;

use recmap_convert::ConverterRegistry;
use recmap_schema::{ClassCatalog, ClassSchema, EmbedMode, FieldDecl, FieldType};
use recmap_types::{ClassId, TYPE_KEY};

use crate::entry::{ConversionMode, FieldMapping, KeyKind, RecordTarget, ValuePlan};
use crate::error::{MetadataError, MetadataResult};

/// Resolves declared fields against the catalog and converter registry.
pub(crate) struct TypeResolver<'a> {
    pub catalog: &'a ClassCatalog,
    pub registry: &'a ConverterRegistry,
}

/// The field being resolved, for error context.
struct Site<'a> {
    class: &'a ClassId,
    decl: &'a FieldDecl,
}

impl<'a> TypeResolver<'a> {
    /// Resolve every field of a class schema.
    ///
    /// Returns the mappings in declaration order and the index of the key
    /// field, if any.
    pub fn resolve_fields(
        &self,
        class: &ClassId,
        schema: &ClassSchema,
    ) -> MetadataResult<(Vec<FieldMapping>, Option<usize>)> {
        let mut names = HashSet::new();
        let mut storage_names = HashSet::new();
        let mut fields = Vec::with_capacity(schema.fields.len());

        for decl in &schema.fields {
            if !names.insert(decl.name.as_str()) {
                return Err(MetadataError::DuplicateField {
                    class: class.clone(),
                    field: decl.name.clone(),
                });
            }
            let storage_name = decl.effective_storage_name();
            if storage_name == TYPE_KEY {
                return Err(MetadataError::ReservedStorageName {
                    class: class.clone(),
                    field: decl.name.clone(),
                });
            }
            if !storage_names.insert(storage_name) {
                return Err(MetadataError::DuplicateStorageName {
                    class: class.clone(),
                    name: storage_name.to_string(),
                });
            }
            fields.push(self.resolve_field(class, decl)?);
        }

        let keys: Vec<usize> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.key)
            .map(|(i, _)| i)
            .collect();
        if keys.len() > 1 {
            return Err(MetadataError::DuplicateKeyField {
                class: class.clone(),
                fields: keys.iter().map(|&i| fields[i].name.clone()).collect(),
            });
        }
        Ok((fields, keys.first().copied()))
    }

    fn resolve_field(&self, class: &ClassId, decl: &FieldDecl) -> MetadataResult<FieldMapping> {
        let site = Site { class, decl };
        if decl.converter.is_some() && decl.embed.is_some() {
            return Err(MetadataError::ConflictingMapping {
                class: class.clone(),
                field: decl.name.clone(),
            });
        }

        let (plan, mode) = match &decl.converter {
            Some(tag) => {
                let entry =
                    self.registry
                        .lookup(tag)
                        .ok_or_else(|| MetadataError::UnknownConverter {
                            class: class.clone(),
                            field: decl.name.clone(),
                            tag: tag.clone(),
                        })?;
                (ValuePlan::Convert(entry), ConversionMode::ConverterDefined)
            }
            None => {
                if decl.embed.is_some() && decl.ty.record_class().is_none() {
                    return Err(MetadataError::InvalidEmbedding {
                        class: class.clone(),
                        field: decl.name.clone(),
                        ty: decl.ty.to_string(),
                    });
                }
                let plan = self.resolve_type(&site, &decl.ty, decl.embed)?;
                let mode = plan.mode();
                (plan, mode)
            }
        };

        if decl.key && !matches!(plan, ValuePlan::Convert(_)) {
            return Err(MetadataError::InvalidKeyType {
                class: class.clone(),
                field: decl.name.clone(),
                ty: decl.ty.to_string(),
            });
        }

        Ok(FieldMapping {
            name: decl.name.clone(),
            storage_name: decl.effective_storage_name().to_string(),
            ty: decl.ty.clone(),
            mode,
            plan,
            nullable: decl.nullable,
            key: decl.key,
        })
    }

    fn resolve_type(
        &self,
        site: &Site<'_>,
        ty: &FieldType,
        embed: Option<EmbedMode>,
    ) -> MetadataResult<ValuePlan> {
        if let (FieldType::Record(id), Some(mode)) = (ty, embed) {
            return Ok(ValuePlan::Embed {
                target: self.target(id)?,
                mode,
            });
        }

        if let Some(entry) = self.registry.lookup_user(&ty.tag()) {
            return Ok(ValuePlan::Convert(entry));
        }

        match ty {
            FieldType::Record(id) => Ok(ValuePlan::Reference {
                target: self.target(id)?,
            }),
            FieldType::List(element) | FieldType::Set(element) => Ok(ValuePlan::List(Box::new(
                self.resolve_type(site, element, embed)?,
            ))),
            FieldType::Map(key, value) => {
                let key = KeyKind::from_field_type(key).ok_or_else(|| {
                    MetadataError::UnsupportedMapKey {
                        class: site.class.clone(),
                        field: site.decl.name.clone(),
                        ty: key.to_string(),
                    }
                })?;
                Ok(ValuePlan::Map {
                    key,
                    value: Box::new(self.resolve_type(site, value, embed)?),
                })
            }
            other => {
                let tag = other.tag();
                self.registry
                    .builtin(&tag)
                    .map(ValuePlan::Convert)
                    .ok_or_else(|| MetadataError::UnknownConverter {
                        class: site.class.clone(),
                        field: site.decl.name.clone(),
                        tag,
                    })
            }
        }
    }

    fn target(&self, id: &ClassId) -> MetadataResult<RecordTarget> {
        let descriptor = self
            .catalog
            .get(id)
            .ok_or_else(|| MetadataError::UnknownClass(id.clone()))?;
        Ok(if descriptor.is_abstract() {
            RecordTarget::Polymorphic(id.clone())
        } else {
            RecordTarget::Concrete(id.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recmap_convert::{ConvertResult, Converter};
    use recmap_schema::Record;
    use recmap_types::{StorageValue, TypeTag, Value};

    #[derive(Clone, Debug, Default)]
    struct Address {
        city: String,
    }

    recmap_types::entity!(Address { city });

    impl Record for Address {
        fn schema() -> ClassSchema {
            ClassSchema::new().field(FieldDecl::new("city", FieldType::Text))
        }
    }

    struct Upper;

    impl Converter for Upper {
        fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue> {
            match value {
                Value::Text(s) => Ok(StorageValue::Text(s.to_uppercase())),
                _ => Ok(StorageValue::Null),
            }
        }

        fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value> {
            Ok(Value::Text(value.as_str().unwrap_or_default().to_lowercase()))
        }
    }

    struct Fixture {
        catalog: ClassCatalog,
        registry: ConverterRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = ClassCatalog::new();
            catalog.register::<Address>().unwrap();
            catalog
                .register_abstract("Shape", ClassSchema::new())
                .unwrap();
            Self {
                catalog,
                registry: ConverterRegistry::new(),
            }
        }

        fn resolve(&self, schema: ClassSchema) -> MetadataResult<(Vec<FieldMapping>, Option<usize>)> {
            let resolver = TypeResolver {
                catalog: &self.catalog,
                registry: &self.registry,
            };
            resolver.resolve_fields(&ClassId::new("app::Person"), &schema)
        }

        fn single(&self, decl: FieldDecl) -> MetadataResult<FieldMapping> {
            self.resolve(ClassSchema::new().field(decl))
                .map(|(mut fields, _)| fields.remove(0))
        }
    }

    // -----------------------------------------------------------------------
    // Resolution order
    // -----------------------------------------------------------------------

    #[test]
    fn scalars_use_builtins() {
        let fx = Fixture::new();
        let field = fx.single(FieldDecl::new("age", FieldType::Int)).unwrap();
        assert_eq!(field.mode, ConversionMode::Scalar);
        assert!(matches!(field.plan, ValuePlan::Convert(ref e) if e.tag == TypeTag::INT));
    }

    #[test]
    fn user_converter_shadows_builtin() {
        let fx = Fixture::new();
        fx.registry.register(TypeTag::TEXT, Upper).unwrap();
        let field = fx.single(FieldDecl::new("name", FieldType::Text)).unwrap();
        assert_eq!(field.mode, ConversionMode::ConverterDefined);
    }

    #[test]
    fn explicit_binding_wins() {
        let fx = Fixture::new();
        fx.registry.register("upper", Upper).unwrap();
        let field = fx
            .single(FieldDecl::new("name", FieldType::Text).converter("upper"))
            .unwrap();
        assert_eq!(field.mode, ConversionMode::ConverterDefined);
        assert!(matches!(field.plan, ValuePlan::Convert(ref e) if e.tag == TypeTag::new("upper")));
    }

    #[test]
    fn unknown_binding_is_rejected() {
        let fx = Fixture::new();
        let err = fx
            .single(FieldDecl::new("name", FieldType::Text).converter("missing"))
            .unwrap_err();
        assert!(matches!(err, MetadataError::UnknownConverter { ref tag, .. } if tag.as_str() == "missing"));
    }

    #[test]
    fn records_default_to_reference() {
        let fx = Fixture::new();
        let field = fx
            .single(FieldDecl::new("home", FieldType::record::<Address>()))
            .unwrap();
        assert_eq!(field.mode, ConversionMode::ReferenceByKey);
    }

    #[test]
    fn embed_annotation_applies_through_collections() {
        let fx = Fixture::new();
        let field = fx
            .single(
                FieldDecl::new(
                    "homes",
                    FieldType::map(FieldType::Text, FieldType::list(FieldType::record::<Address>())),
                )
                .embed(EmbedMode::List),
            )
            .unwrap();
        assert_eq!(field.mode, ConversionMode::EmbedAsList);
    }

    #[test]
    fn abstract_target_is_polymorphic() {
        let fx = Fixture::new();
        let field = fx
            .single(FieldDecl::new("shape", FieldType::record_id("Shape")).embed(EmbedMode::Map))
            .unwrap();
        assert!(matches!(
            field.plan,
            ValuePlan::Embed { target: RecordTarget::Polymorphic(_), mode: EmbedMode::Map }
        ));
    }

    #[test]
    fn custom_type_needs_a_converter() {
        let fx = Fixture::new();
        let err = fx
            .single(FieldDecl::new("price", FieldType::custom("money")))
            .unwrap_err();
        assert!(matches!(err, MetadataError::UnknownConverter { .. }));
    }

    // -----------------------------------------------------------------------
    // Declaration errors
    // -----------------------------------------------------------------------

    #[test]
    fn embed_on_scalar_is_rejected() {
        let fx = Fixture::new();
        let err = fx
            .single(FieldDecl::new("age", FieldType::Int).embed(EmbedMode::Map))
            .unwrap_err();
        assert!(matches!(err, MetadataError::InvalidEmbedding { .. }));
    }

    #[test]
    fn converter_and_embed_together_are_rejected() {
        let fx = Fixture::new();
        fx.registry.register("upper", Upper).unwrap();
        let err = fx
            .single(
                FieldDecl::new("home", FieldType::record::<Address>())
                    .converter("upper")
                    .embed(EmbedMode::Map),
            )
            .unwrap_err();
        assert_eq!(
            err,
            MetadataError::ConflictingMapping {
                class: ClassId::new("app::Person"),
                field: "home".into(),
            }
        );
    }

    #[test]
    fn unknown_record_class_is_rejected() {
        let fx = Fixture::new();
        let err = fx
            .single(FieldDecl::new("pet", FieldType::record_id("app::Pet")))
            .unwrap_err();
        assert_eq!(err, MetadataError::UnknownClass(ClassId::new("app::Pet")));
    }

    #[test]
    fn float_map_keys_are_rejected() {
        let fx = Fixture::new();
        let err = fx
            .single(FieldDecl::new(
                "weights",
                FieldType::map(FieldType::Float, FieldType::Int),
            ))
            .unwrap_err();
        assert!(matches!(err, MetadataError::UnsupportedMapKey { ref ty, .. } if ty == "float"));
    }

    #[test]
    fn non_scalar_key_is_rejected() {
        let fx = Fixture::new();
        let err = fx
            .single(FieldDecl::new("tags", FieldType::list(FieldType::Text)).key())
            .unwrap_err();
        assert!(matches!(err, MetadataError::InvalidKeyType { .. }));
    }

    #[test]
    fn two_key_fields_are_rejected() {
        let fx = Fixture::new();
        let err = fx
            .resolve(
                ClassSchema::new()
                    .field(FieldDecl::new("a", FieldType::Int).key())
                    .field(FieldDecl::new("b", FieldType::Int).key()),
            )
            .unwrap_err();
        assert!(matches!(err, MetadataError::DuplicateKeyField { ref fields, .. } if fields.len() == 2));
    }

    #[test]
    fn storage_name_collisions_are_rejected() {
        let fx = Fixture::new();
        let err = fx
            .resolve(
                ClassSchema::new()
                    .field(FieldDecl::new("a", FieldType::Int).storage_name("x"))
                    .field(FieldDecl::new("x", FieldType::Int)),
            )
            .unwrap_err();
        assert!(matches!(err, MetadataError::DuplicateStorageName { ref name, .. } if name == "x"));

        let err = fx
            .single(FieldDecl::new("kind", FieldType::Text).storage_name("@type"))
            .unwrap_err();
        assert!(matches!(err, MetadataError::ReservedStorageName { .. }));
    }

    #[test]
    fn key_index_points_at_key_field() {
        let fx = Fixture::new();
        let (fields, key) = fx
            .resolve(
                ClassSchema::new()
                    .field(FieldDecl::new("name", FieldType::Text))
                    .field(FieldDecl::new("id", FieldType::Uuid).key()),
            )
            .unwrap();
        assert_eq!(key, Some(1));
        assert_eq!(fields[1].name, "id");
    }
}
