//! Discriminator tables for abstract record roots.

use std::collections::{BTreeMap, HashMap};

use recmap_types::ClassId;

use crate::error::{MetadataError, MetadataResult};

/// Bidirectional discriminator ⇄ variant mapping for one abstract record
/// root.
///
/// Variant entries are looked up through the cache by class id.
/// Discriminators belong to the concrete class, so a class that implements
/// two roots appears under the same discriminator in both tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolymorphismTable {
    base: ClassId,
    by_discriminator: BTreeMap<String, ClassId>,
    by_class: HashMap<ClassId, String>,
}

impl PolymorphismTable {
    /// Build a table from `(variant, discriminator)` pairs.
    ///
    /// Fails if there are no variants or two variants share a discriminator.
    pub fn build(
        base: ClassId,
        variants: impl IntoIterator<Item = (ClassId, String)>,
    ) -> MetadataResult<Self> {
        let mut by_discriminator = BTreeMap::new();
        let mut by_class = HashMap::new();
        for (class, discriminator) in variants {
            if let Some(first) = by_discriminator.get(&discriminator) {
                return Err(MetadataError::DuplicateDiscriminator {
                    base,
                    discriminator,
                    first: ClassId::clone(first),
                    second: class,
                });
            }
            by_discriminator.insert(discriminator.clone(), class.clone());
            by_class.insert(class, discriminator);
        }
        if by_discriminator.is_empty() {
            return Err(MetadataError::NoVariants(base));
        }
        Ok(Self {
            base,
            by_discriminator,
            by_class,
        })
    }

    pub fn base(&self) -> &ClassId {
        &self.base
    }

    /// The variant stored under `discriminator`.
    pub fn variant(&self, discriminator: &str) -> Option<&ClassId> {
        self.by_discriminator.get(discriminator)
    }

    /// The discriminator of a variant class.
    pub fn discriminator_of(&self, class: &ClassId) -> Option<&str> {
        self.by_class.get(class).map(String::as_str)
    }

    pub fn contains(&self, class: &ClassId) -> bool {
        self.by_class.contains_key(class)
    }

    /// `(discriminator, variant)` pairs in discriminator order.
    pub fn variants(&self) -> impl Iterator<Item = (&str, &ClassId)> {
        self.by_discriminator.iter().map(|(d, c)| (d.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.by_discriminator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_discriminator.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ClassId {
        ClassId::new(name)
    }

    #[test]
    fn lookups_in_both_directions() {
        let table = PolymorphismTable::build(
            id("Shape"),
            vec![
                (id("app::Circle"), "Circle".to_string()),
                (id("app::Square"), "sq".to_string()),
            ],
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.variant("sq"), Some(&id("app::Square")));
        assert_eq!(table.discriminator_of(&id("app::Circle")), Some("Circle"));
        assert!(table.variant("Triangle").is_none());
        let order: Vec<&str> = table.variants().map(|(d, _)| d).collect();
        assert_eq!(order, vec!["Circle", "sq"]);
    }

    #[test]
    fn duplicate_discriminator_is_rejected() {
        let err = PolymorphismTable::build(
            id("Shape"),
            vec![
                (id("a::Circle"), "Circle".to_string()),
                (id("b::Circle"), "Circle".to_string()),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            MetadataError::DuplicateDiscriminator {
                base: id("Shape"),
                discriminator: "Circle".into(),
                first: id("a::Circle"),
                second: id("b::Circle"),
            }
        );
    }

    #[test]
    fn empty_table_is_rejected() {
        let err = PolymorphismTable::build(id("Shape"), Vec::new()).unwrap_err();
        assert_eq!(err, MetadataError::NoVariants(id("Shape")));
    }
}
