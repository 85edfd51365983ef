//! Shared model classes for this crate's tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use recmap_convert::ConverterRegistry;
use recmap_schema::{ClassCatalog, ClassSchema, EmbedMode, FieldDecl, FieldType, Record};
use recmap_types::{ClassId, Entity};
use uuid::Uuid;

use crate::cache::MetadataCache;

pub const BASE: &str = "BaseInterface";

pub fn base_id() -> ClassId {
    ClassId::new(BASE)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubClass1 {
    pub my_name: String,
}

recmap_types::entity!(SubClass1 { my_name });

impl Record for SubClass1 {
    fn schema() -> ClassSchema {
        ClassSchema::new()
            .implements(BASE)
            .field(FieldDecl::new("my_name", FieldType::Text).key())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubClass2 {
    pub my_name: String,
}

recmap_types::entity!(SubClass2 { my_name });

impl Record for SubClass2 {
    fn schema() -> ClassSchema {
        ClassSchema::new()
            .implements(BASE)
            .field(FieldDecl::new("my_name", FieldType::Text).key())
    }
}

/// Holds its children by reference.
#[derive(Clone, Debug, Default)]
pub struct Container {
    pub id: i64,
    pub children: Vec<Box<dyn Entity>>,
}

recmap_types::entity!(Container { id, children });

impl Record for Container {
    fn schema() -> ClassSchema {
        ClassSchema::new()
            .namespace("test")
            .set("container")
            .field(FieldDecl::new("id", FieldType::Int).key())
            .field(FieldDecl::new(
                "children",
                FieldType::list(FieldType::record_id(BASE)),
            ))
    }
}

/// Holds its children embedded.
#[derive(Clone, Debug, Default)]
pub struct NestedContainer {
    pub id: i64,
    pub children: Vec<Box<dyn Entity>>,
}

recmap_types::entity!(NestedContainer { id, children });

impl Record for NestedContainer {
    fn schema() -> ClassSchema {
        ClassSchema::new()
            .namespace("test")
            .set("container")
            .field(FieldDecl::new("id", FieldType::Int).key())
            .field(
                FieldDecl::new("children", FieldType::list(FieldType::record_id(BASE)))
                    .embed(EmbedMode::Map),
            )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    #[default]
    Free,
    Gold,
}

recmap_types::value_enum!(Tier { Free, Gold });

/// Embedded-only: no namespace, no key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Address {
    pub street: String,
    pub city: String,
}

recmap_types::entity!(Address { street, city });

impl Record for Address {
    fn schema() -> ClassSchema {
        ClassSchema::new()
            .field(FieldDecl::new("street", FieldType::Text))
            .field(FieldDecl::new("city", FieldType::Text))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub born: NaiveDate,
    pub joined: DateTime<Utc>,
    pub tier: Tier,
    pub tags: BTreeSet<String>,
    pub scores: BTreeMap<i64, f64>,
    pub home: Address,
    pub previous: Vec<Address>,
    pub nickname: Option<String>,
}

recmap_types::entity!(Person {
    id,
    name,
    age,
    born,
    joined,
    tier,
    tags,
    scores,
    home,
    previous,
    nickname,
});

impl Record for Person {
    fn schema() -> ClassSchema {
        ClassSchema::new()
            .namespace("test")
            .set("people")
            .ttl(3600)
            .send_key(true)
            .field(FieldDecl::new("id", FieldType::Uuid).key())
            .field(FieldDecl::new("name", FieldType::Text).storage_name("n"))
            .field(FieldDecl::new("age", FieldType::Int))
            .field(FieldDecl::new("born", FieldType::Date))
            .field(FieldDecl::new("joined", FieldType::Timestamp))
            .field(FieldDecl::new("tier", FieldType::Enum))
            .field(FieldDecl::new("tags", FieldType::set(FieldType::Text)))
            .field(FieldDecl::new(
                "scores",
                FieldType::map(FieldType::Int, FieldType::Float),
            ))
            .field(FieldDecl::new("home", FieldType::record::<Address>()).embed(EmbedMode::Map))
            .field(
                FieldDecl::new("previous", FieldType::list(FieldType::record::<Address>()))
                    .embed(EmbedMode::List),
            )
            .field(FieldDecl::new("nickname", FieldType::Text).nullable())
    }
}

/// Embeds itself through a collection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub name: String,
    pub children: Vec<Node>,
}

recmap_types::entity!(Node { name, children });

impl Record for Node {
    fn schema() -> ClassSchema {
        ClassSchema::new()
            .namespace("test")
            .field(FieldDecl::new("name", FieldType::Text).key())
            .field(
                FieldDecl::new("children", FieldType::list(FieldType::record::<Node>()))
                    .embed(EmbedMode::Map),
            )
    }
}

/// Catalog with every model class registered.
pub fn catalog() -> ClassCatalog {
    let catalog = ClassCatalog::new();
    catalog
        .register_abstract(BASE, ClassSchema::new().namespace("test").set("testSet"))
        .unwrap();
    catalog.register::<SubClass1>().unwrap();
    catalog.register::<SubClass2>().unwrap();
    catalog.register::<Container>().unwrap();
    catalog.register::<NestedContainer>().unwrap();
    catalog.register::<Address>().unwrap();
    catalog.register::<Person>().unwrap();
    catalog.register::<Node>().unwrap();
    catalog
}

pub fn cache() -> MetadataCache {
    MetadataCache::new(Arc::new(catalog()), Arc::new(ConverterRegistry::new()))
}

pub fn cache_with(catalog: ClassCatalog, registry: ConverterRegistry) -> MetadataCache {
    MetadataCache::new(Arc::new(catalog), Arc::new(registry))
}

pub fn sample_person() -> Person {
    Person {
        id: Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0),
        name: "Ada".into(),
        age: 36,
        born: NaiveDate::from_ymd_opt(1815, 12, 10).unwrap(),
        joined: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
        tier: Tier::Gold,
        tags: ["math", "engines"].into_iter().map(String::from).collect(),
        scores: BTreeMap::from([(1, 0.5), (2, 1.25)]),
        home: Address {
            street: "12 St James's Square".into(),
            city: "London".into(),
        },
        previous: vec![Address {
            street: "Piccadilly".into(),
            city: "London".into(),
        }],
        nickname: None,
    }
}
