use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::field::EmbedMode;

/// Structured mapper configuration: per-class schema overrides.
///
/// ```toml
/// [[classes]]
/// class = "app::Person"
/// namespace = "test"
/// set = "people"
/// ttl = 3600
/// key_field = "id"
///
/// [[classes.fields]]
/// name = "address"
/// embed = "map"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperConfig {
    #[serde(default)]
    pub classes: Vec<ClassConfig>,
}

impl MapperConfig {
    /// Parse a TOML configuration document.
    pub fn from_toml_str(text: &str) -> SchemaResult<Self> {
        toml::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))
    }
}

/// Overrides for one class. Absent values keep the declared schema value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassConfig {
    /// Full class id, or a simple name that is unique in the catalog.
    pub class: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub set: Option<String>,
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub key_field: Option<String>,
    #[serde(default)]
    pub durable_delete: Option<bool>,
    #[serde(default)]
    pub send_key: Option<bool>,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

/// Override for one field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(default)]
    pub storage_name: Option<String>,
    #[serde(default)]
    pub embed: Option<EmbedMode>,
    /// Converter tag.
    #[serde(default)]
    pub converter: Option<String>,
    /// Drop the field from the mapping.
    #[serde(default)]
    pub exclude: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
[[classes]]
class = "app::Person"
namespace = "test"
set = "people"
ttl = 3600
key_field = "id"
send_key = true

[[classes.fields]]
name = "address"
embed = "map"

[[classes.fields]]
name = "balance"
storage_name = "bal"
converter = "money"

[[classes]]
class = "Address"
"#;

    #[test]
    fn parses_full_document() {
        let config = MapperConfig::from_toml_str(DOCUMENT).unwrap();
        assert_eq!(config.classes.len(), 2);

        let person = &config.classes[0];
        assert_eq!(person.class, "app::Person");
        assert_eq!(person.namespace.as_deref(), Some("test"));
        assert_eq!(person.ttl, Some(3600));
        assert_eq!(person.key_field.as_deref(), Some("id"));
        assert_eq!(person.send_key, Some(true));
        assert_eq!(person.durable_delete, None);
        assert_eq!(person.fields.len(), 2);
        assert_eq!(person.fields[0].embed, Some(EmbedMode::Map));
        assert_eq!(person.fields[1].converter.as_deref(), Some("money"));
        assert!(!person.fields[1].exclude);
    }

    #[test]
    fn minimal_entry_has_defaults() {
        let config = MapperConfig::from_toml_str(DOCUMENT).unwrap();
        let address = &config.classes[1];
        assert_eq!(address.class, "Address");
        assert!(address.namespace.is_none());
        assert!(address.fields.is_empty());
    }

    #[test]
    fn empty_document_is_empty_config() {
        let config = MapperConfig::from_toml_str("").unwrap();
        assert!(config.classes.is_empty());
    }

    #[test]
    fn malformed_document_is_parse_error() {
        let err = MapperConfig::from_toml_str("[[classes]]\nttl = \"soon\"").unwrap_err();
        assert!(matches!(err, SchemaError::Parse(_)));
    }

    #[test]
    fn bad_embed_mode_is_parse_error() {
        let doc = "[[classes]]\nclass = \"A\"\n[[classes.fields]]\nname = \"x\"\nembed = \"tree\"";
        assert!(MapperConfig::from_toml_str(doc).is_err());
    }
}
