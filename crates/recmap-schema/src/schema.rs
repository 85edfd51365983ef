use recmap_types::{ClassId, Entity};

use crate::config::ClassConfig;
use crate::error::{SchemaError, SchemaResult};
use crate::field::FieldDecl;

/// Declarative description of one class.
///
/// Field order is significant: it is the order of list-embedded
/// representations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassSchema {
    pub namespace: Option<String>,
    pub set: Option<String>,
    /// Record time-to-live in seconds; `0` means no expiry.
    pub ttl: u32,
    pub durable_delete: bool,
    pub send_key: bool,
    /// Discriminator override; defaults to the simple class name.
    pub discriminator: Option<String>,
    /// Record bases (abstract roots) this class implements or extends.
    pub implements: Vec<ClassId>,
    pub fields: Vec<FieldDecl>,
}

impl ClassSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn set(mut self, set: impl Into<String>) -> Self {
        self.set = Some(set.into());
        self
    }

    pub fn ttl(mut self, seconds: u32) -> Self {
        self.ttl = seconds;
        self
    }

    pub fn durable_delete(mut self, enabled: bool) -> Self {
        self.durable_delete = enabled;
        self
    }

    pub fn send_key(mut self, enabled: bool) -> Self {
        self.send_key = enabled;
        self
    }

    pub fn discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }

    pub fn implements(mut self, base: impl Into<ClassId>) -> Self {
        self.implements.push(base.into());
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Merge a configuration entry over this schema.
    ///
    /// Present config values win; absent ones keep the declared value.
    /// Excluded fields are dropped. Naming a field the class does not
    /// declare is an error.
    pub fn with_overrides(&self, class: &ClassId, config: &ClassConfig) -> SchemaResult<Self> {
        let mut merged = self.clone();

        if let Some(namespace) = &config.namespace {
            merged.namespace = Some(namespace.clone());
        }
        if let Some(set) = &config.set {
            merged.set = Some(set.clone());
        }
        if let Some(ttl) = config.ttl {
            merged.ttl = ttl;
        }
        if let Some(durable_delete) = config.durable_delete {
            merged.durable_delete = durable_delete;
        }
        if let Some(send_key) = config.send_key {
            merged.send_key = send_key;
        }
        if let Some(discriminator) = &config.discriminator {
            merged.discriminator = Some(discriminator.clone());
        }

        if let Some(key_field) = &config.key_field {
            if merged.find_field(key_field).is_none() {
                return Err(SchemaError::UnknownField {
                    class: class.clone(),
                    field: key_field.clone(),
                });
            }
            for field in &mut merged.fields {
                field.key = field.name == *key_field;
            }
        }

        for rule in &config.fields {
            let field = merged
                .fields
                .iter_mut()
                .find(|f| f.name == rule.name)
                .ok_or_else(|| SchemaError::UnknownField {
                    class: class.clone(),
                    field: rule.name.clone(),
                })?;
            if let Some(storage_name) = &rule.storage_name {
                field.storage_name = Some(storage_name.clone());
            }
            if let Some(embed) = rule.embed {
                field.embed = Some(embed);
            }
            if let Some(converter) = &rule.converter {
                field.converter = Some(converter.as_str().into());
            }
        }

        merged
            .fields
            .retain(|f| !config.fields.iter().any(|rule| rule.exclude && rule.name == f.name));

        Ok(merged)
    }
}

/// A concrete class with in-language declarative metadata.
///
/// Implement [`Entity`] with [`recmap_types::entity!`] and supply the
/// schema here. `Default` provides the blank instance hydration starts
/// from.
pub trait Record: Entity + Default + Clone {
    fn schema() -> ClassSchema;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldConfig;
    use crate::field::{EmbedMode, FieldType};

    fn person_schema() -> ClassSchema {
        ClassSchema::new()
            .namespace("test")
            .set("people")
            .field(FieldDecl::new("id", FieldType::Text).key())
            .field(FieldDecl::new("email", FieldType::Text))
            .field(FieldDecl::new("address", FieldType::record_id("Address")))
            .field(FieldDecl::new("notes", FieldType::Text).nullable())
    }

    fn class() -> ClassId {
        ClassId::new("app::Person")
    }

    #[test]
    fn builder_collects_fields_in_order() {
        let schema = person_schema();
        let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "email", "address", "notes"]);
        assert!(schema.find_field("email").is_some());
        assert!(schema.find_field("phone").is_none());
    }

    #[test]
    fn overrides_replace_present_values_only() {
        let config = ClassConfig {
            class: "app::Person".into(),
            set: Some("users".into()),
            ttl: Some(60),
            ..ClassConfig::default()
        };
        let merged = person_schema().with_overrides(&class(), &config).unwrap();
        assert_eq!(merged.namespace.as_deref(), Some("test"));
        assert_eq!(merged.set.as_deref(), Some("users"));
        assert_eq!(merged.ttl, 60);
        assert!(!merged.durable_delete);
    }

    #[test]
    fn key_field_override_moves_the_key() {
        let config = ClassConfig {
            class: "app::Person".into(),
            key_field: Some("email".into()),
            ..ClassConfig::default()
        };
        let merged = person_schema().with_overrides(&class(), &config).unwrap();
        let keys: Vec<&str> = merged
            .fields
            .iter()
            .filter(|f| f.key)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(keys, vec!["email"]);
    }

    #[test]
    fn field_rules_apply() {
        let config = ClassConfig {
            class: "app::Person".into(),
            fields: vec![
                FieldConfig {
                    name: "address".into(),
                    embed: Some(EmbedMode::List),
                    storage_name: Some("addr".into()),
                    ..FieldConfig::default()
                },
                FieldConfig {
                    name: "notes".into(),
                    exclude: true,
                    ..FieldConfig::default()
                },
            ],
            ..ClassConfig::default()
        };
        let merged = person_schema().with_overrides(&class(), &config).unwrap();
        let address = merged.find_field("address").unwrap();
        assert_eq!(address.embed, Some(EmbedMode::List));
        assert_eq!(address.effective_storage_name(), "addr");
        assert!(merged.find_field("notes").is_none());
        assert_eq!(merged.fields.len(), 3);
    }

    #[test]
    fn unknown_field_rule_is_rejected() {
        let config = ClassConfig {
            class: "app::Person".into(),
            fields: vec![FieldConfig {
                name: "phone".into(),
                ..FieldConfig::default()
            }],
            ..ClassConfig::default()
        };
        let err = person_schema().with_overrides(&class(), &config).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownField {
                class: class(),
                field: "phone".into()
            }
        );
    }

    #[test]
    fn unknown_key_field_is_rejected() {
        let config = ClassConfig {
            class: "app::Person".into(),
            key_field: Some("ssn".into()),
            ..ClassConfig::default()
        };
        assert!(person_schema().with_overrides(&class(), &config).is_err());
    }
}
