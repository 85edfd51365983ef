use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reserved storage entry carrying the discriminator of a polymorphic value.
pub const TYPE_KEY: &str = "@type";

/// Wire-level value exchanged with the store.
///
/// The store layer turns these into its own wire types. Maps are always
/// string-keyed; non-string keys are stringified by the mapping layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StorageValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<StorageValue>),
    Map(BTreeMap<String, StorageValue>),
}

impl StorageValue {
    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[StorageValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, StorageValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<bool> for StorageValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for StorageValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for StorageValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for StorageValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for StorageValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A storage record: storage field name → [`StorageValue`].
///
/// This is the universal intermediate form both conversion directions
/// target. Entries are kept sorted by name so records compare and
/// serialize deterministically.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageRecord {
    bins: BTreeMap<String, StorageValue>,
}

impl StorageRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a bin, returning the previous value under that name.
    pub fn insert(&mut self, name: impl Into<String>, value: StorageValue) -> Option<StorageValue> {
        self.bins.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&StorageValue> {
        self.bins.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<StorageValue> {
        self.bins.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bins.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Iterate bins in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StorageValue)> {
        self.bins.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Wrap an existing storage map.
    pub fn from_map(bins: BTreeMap<String, StorageValue>) -> Self {
        Self { bins }
    }

    pub fn as_map(&self) -> &BTreeMap<String, StorageValue> {
        &self.bins
    }

    pub fn into_map(self) -> BTreeMap<String, StorageValue> {
        self.bins
    }

    /// The record as a nested [`StorageValue::Map`].
    pub fn into_value(self) -> StorageValue {
        StorageValue::Map(self.bins)
    }
}

impl FromIterator<(String, StorageValue)> for StorageRecord {
    fn from_iter<I: IntoIterator<Item = (String, StorageValue)>>(iter: I) -> Self {
        Self {
            bins: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn storage_value() -> impl Strategy<Value = StorageValue> {
        let leaf = prop_oneof![
            Just(StorageValue::Null),
            any::<bool>().prop_map(StorageValue::Bool),
            any::<i64>().prop_map(StorageValue::Int),
            "[a-z0-9@ ]{0,12}".prop_map(StorageValue::Text),
            proptest::collection::vec(any::<u8>(), 0..8).prop_map(StorageValue::Bytes),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(StorageValue::List),
                proptest::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(StorageValue::Map),
            ]
        })
    }

    #[test]
    fn insert_and_get() {
        let mut record = StorageRecord::new();
        assert!(record.insert("name", "Bob".into()).is_none());
        assert_eq!(record.get("name"), Some(&StorageValue::Text("Bob".into())));
        assert!(record.contains("name"));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn insert_replaces_existing() {
        let mut record = StorageRecord::new();
        record.insert("age", StorageValue::Int(1));
        let previous = record.insert("age", StorageValue::Int(2));
        assert_eq!(previous, Some(StorageValue::Int(1)));
        assert_eq!(record.get("age").and_then(StorageValue::as_int), Some(2));
    }

    #[test]
    fn iteration_is_name_ordered() {
        let record: StorageRecord = vec![
            ("zeta".to_string(), StorageValue::Null),
            ("alpha".to_string(), StorageValue::Bool(true)),
        ]
        .into_iter()
        .collect();
        let names: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn into_value_is_map() {
        let mut record = StorageRecord::new();
        record.insert("id", StorageValue::Int(7));
        let value = record.into_value();
        assert_eq!(
            value.as_map().and_then(|m| m.get("id")),
            Some(&StorageValue::Int(7))
        );
    }

    #[test]
    fn record_serializes_as_plain_object() {
        let mut record = StorageRecord::new();
        record.insert("id", StorageValue::Int(7));
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":{"Int":7}}"#);
        let back: StorageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn kind_names() {
        assert_eq!(StorageValue::Null.kind_name(), "null");
        assert_eq!(StorageValue::List(vec![]).kind_name(), "list");
        assert_eq!(StorageValue::Map(BTreeMap::new()).kind_name(), "map");
    }

    proptest! {
        #[test]
        fn records_survive_json(
            bins in proptest::collection::btree_map("[a-z@]{1,8}", storage_value(), 0..6),
        ) {
            let record = StorageRecord::from_map(bins);
            let json = serde_json::to_string(&record).unwrap();
            let back: StorageRecord = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, record);
        }
    }
}
