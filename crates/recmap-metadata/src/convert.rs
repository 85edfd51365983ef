//! Object ⇄ storage record conversion.
//!
//! Every direction is driven by a [`ClassMetadataEntry`]. Nested records
//! resolve their own entries through the cache. Shapes:
//!
//! - embed-as-map: a nested mapping, with `"@type"` when the class has a
//!   discriminator
//! - embed-as-list: field values in declaration order, preceded by the
//!   discriminator when the declared type is polymorphic
//! - reference: the key value, or `[key, discriminator]` when polymorphic

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

use recmap_schema::EmbedMode;
use recmap_types::{ClassId, Entity, StorageRecord, StorageValue, Value, TYPE_KEY};
use uuid::Uuid;

use crate::cache::MetadataCache;
use crate::entry::{ClassMetadataEntry, FieldMapping, KeyKind, RecordTarget, ValuePlan};
use crate::error::{MappingError, MappingResult};

/// Produces the objects behind reference-by-key fields during hydration.
pub trait ReferenceLoader {
    /// Load the `entry` instance stored under `key`.
    fn load(
        &self,
        cache: &MetadataCache,
        entry: &ClassMetadataEntry,
        key: &StorageValue,
    ) -> MappingResult<Box<dyn Entity>>;
}

/// Hydrates references as stubs carrying only their key.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubLoader;

impl ReferenceLoader for StubLoader {
    fn load(
        &self,
        cache: &MetadataCache,
        entry: &ClassMetadataEntry,
        key: &StorageValue,
    ) -> MappingResult<Box<dyn Entity>> {
        cache.stub(entry, key)
    }
}

/// An entry handed in by the caller or fetched from the cache.
enum EntryRef<'e> {
    Borrowed(&'e ClassMetadataEntry),
    Shared(Arc<ClassMetadataEntry>),
}

impl Deref for EntryRef<'_> {
    type Target = ClassMetadataEntry;

    fn deref(&self) -> &ClassMetadataEntry {
        match self {
            Self::Borrowed(entry) => entry,
            Self::Shared(entry) => entry,
        }
    }
}

impl MetadataCache {
    // ---- Object → storage ----

    /// Convert an object to its storage record.
    ///
    /// `entry` may be the object's own class or an abstract record root the
    /// class implements.
    pub fn to_storage(
        &self,
        object: &dyn Entity,
        entry: &ClassMetadataEntry,
    ) -> MappingResult<StorageRecord> {
        let class = object.class_id();
        self.runtime_entry(entry, &class)
            .and_then(|concrete| self.record_bins(object, &concrete))
            .map(StorageRecord::from_map)
            .map_err(|e| e.within(class.simple_name()))
    }

    /// The object's key, converted like any other field.
    pub fn key_of(
        &self,
        object: &dyn Entity,
        entry: &ClassMetadataEntry,
    ) -> MappingResult<StorageValue> {
        let class = object.class_id();
        self.runtime_entry(entry, &class)
            .and_then(|concrete| self.key_value(object, &concrete))
            .map_err(|e| e.within(class.simple_name()))
    }

    fn record_bins(
        &self,
        object: &dyn Entity,
        entry: &ClassMetadataEntry,
    ) -> MappingResult<BTreeMap<String, StorageValue>> {
        let mut bins = BTreeMap::new();
        for field in &entry.fields {
            let value = field_value(object, field)?;
            if value.is_null() {
                continue;
            }
            let stored = self
                .value_to_storage(&value, &field.plan)
                .map_err(|e| e.within(&field.name))?;
            bins.insert(field.storage_name.clone(), stored);
        }
        if let Some(discriminator) = &entry.discriminator {
            bins.insert(TYPE_KEY.to_string(), StorageValue::Text(discriminator.clone()));
        }
        Ok(bins)
    }

    fn key_value(
        &self,
        object: &dyn Entity,
        entry: &ClassMetadataEntry,
    ) -> MappingResult<StorageValue> {
        let missing = || MappingError::MissingKey {
            class: entry.id.clone(),
            path: String::new(),
        };
        let field = entry.key_field().ok_or_else(missing)?;
        let value = field_value(object, field)?;
        if value.is_null() {
            return Err(missing().within(&field.name));
        }
        self.value_to_storage(&value, &field.plan)
            .map_err(|e| e.within(&field.name))
    }

    fn value_to_storage(&self, value: &Value, plan: &ValuePlan) -> MappingResult<StorageValue> {
        if value.is_null() {
            return Ok(StorageValue::Null);
        }
        match plan {
            ValuePlan::Convert(entry) => entry
                .converter
                .to_storage(value)
                .map_err(MappingError::conversion),
            ValuePlan::Embed { target, mode } => {
                let object = as_object(value)?;
                let entry = self.target_entry(target, &object.class_id())?;
                match mode {
                    EmbedMode::Map => self.record_bins(object, &entry).map(StorageValue::Map),
                    EmbedMode::List => {
                        let mut items = Vec::with_capacity(entry.fields.len() + 1);
                        if target.is_polymorphic() {
                            items.push(StorageValue::Text(discriminator_of(&entry)));
                        }
                        for field in &entry.fields {
                            let value = field_value(object, field)?;
                            let stored = self
                                .value_to_storage(&value, &field.plan)
                                .map_err(|e| e.within(&field.name))?;
                            items.push(stored);
                        }
                        Ok(StorageValue::List(items))
                    }
                }
            }
            ValuePlan::Reference { target } => {
                let object = as_object(value)?;
                let entry = self.target_entry(target, &object.class_id())?;
                let key = self.key_value(object, &entry)?;
                if target.is_polymorphic() {
                    Ok(StorageValue::List(vec![
                        key,
                        StorageValue::Text(discriminator_of(&entry)),
                    ]))
                } else {
                    Ok(key)
                }
            }
            ValuePlan::List(element) => match value {
                Value::List(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        self.value_to_storage(item, element)
                            .map_err(|e| e.within(&format!("[{i}]")))
                    })
                    .collect::<MappingResult<Vec<_>>>()
                    .map(StorageValue::List),
                other => Err(MappingError::conversion(format!(
                    "expected list, found {}",
                    other.kind_name()
                ))),
            },
            ValuePlan::Map { key, value: element } => match value {
                Value::Map(pairs) => {
                    let mut out = BTreeMap::new();
                    for (k, v) in pairs {
                        let name = key_to_string(*key, k)?;
                        let stored = self
                            .value_to_storage(v, element)
                            .map_err(|e| e.within(&format!("[{name}]")))?;
                        out.insert(name, stored);
                    }
                    Ok(StorageValue::Map(out))
                }
                other => Err(MappingError::conversion(format!(
                    "expected map, found {}",
                    other.kind_name()
                ))),
            },
        }
    }

    // ---- Storage → object ----

    /// Hydrate an object, loading references as key-only stubs.
    pub fn from_storage(
        &self,
        record: &StorageRecord,
        entry: &ClassMetadataEntry,
    ) -> MappingResult<Box<dyn Entity>> {
        self.from_storage_with(record, entry, &StubLoader)
    }

    /// Hydrate an object, loading references through `loader`.
    ///
    /// For an abstract record root the stored discriminator selects the
    /// variant. Absent and null bins leave the field at its default.
    pub fn from_storage_with(
        &self,
        record: &StorageRecord,
        entry: &ClassMetadataEntry,
        loader: &dyn ReferenceLoader,
    ) -> MappingResult<Box<dyn Entity>> {
        let bins = record.as_map();
        let concrete = if entry.is_abstract() {
            let selected = stored_discriminator(bins)
                .and_then(|d| self.variant_entry(&entry.id, d))
                .map_err(|e| e.within(entry.id.simple_name()))?;
            EntryRef::Shared(selected)
        } else {
            EntryRef::Borrowed(entry)
        };
        self.hydrate(bins, &concrete, loader)
            .map_err(|e| e.within(concrete.id.simple_name()))
    }

    /// A default instance with only its key field set from `key`.
    pub fn stub(
        &self,
        entry: &ClassMetadataEntry,
        key: &StorageValue,
    ) -> MappingResult<Box<dyn Entity>> {
        let mut object = instantiate(entry)?;
        if let Some(field) = entry.key_field() {
            let value = self
                .storage_to_value(key, &field.plan, &StubLoader)
                .map_err(|e| e.within(&field.name))?;
            set_field(object.as_mut(), field, value)?;
        }
        Ok(object)
    }

    fn hydrate(
        &self,
        bins: &BTreeMap<String, StorageValue>,
        entry: &ClassMetadataEntry,
        loader: &dyn ReferenceLoader,
    ) -> MappingResult<Box<dyn Entity>> {
        let mut object = instantiate(entry)?;
        for field in &entry.fields {
            let Some(stored) = bins.get(&field.storage_name) else {
                continue;
            };
            self.hydrate_field(object.as_mut(), field, stored, loader)?;
        }
        Ok(object)
    }

    fn hydrate_field(
        &self,
        object: &mut dyn Entity,
        field: &FieldMapping,
        stored: &StorageValue,
        loader: &dyn ReferenceLoader,
    ) -> MappingResult<()> {
        if stored.is_null() {
            return Ok(());
        }
        let value = self
            .storage_to_value(stored, &field.plan, loader)
            .map_err(|e| e.within(&field.name))?;
        set_field(object, field, value)
    }

    fn storage_to_value(
        &self,
        stored: &StorageValue,
        plan: &ValuePlan,
        loader: &dyn ReferenceLoader,
    ) -> MappingResult<Value> {
        if stored.is_null() {
            return Ok(Value::Null);
        }
        match plan {
            ValuePlan::Convert(entry) => entry
                .converter
                .from_storage(stored)
                .map_err(MappingError::hydration),
            ValuePlan::Embed {
                target,
                mode: EmbedMode::Map,
            } => {
                let bins = stored.as_map().ok_or_else(|| unexpected("map", stored))?;
                let entry = match target {
                    RecordTarget::Concrete(id) => self.nested_entry(id)?,
                    RecordTarget::Polymorphic(base) => {
                        self.variant_entry(base, stored_discriminator(bins)?)?
                    }
                };
                self.hydrate(bins, &entry, loader).map(Value::Object)
            }
            ValuePlan::Embed {
                target,
                mode: EmbedMode::List,
            } => {
                let items = stored.as_list().ok_or_else(|| unexpected("list", stored))?;
                let (entry, values) = match target {
                    RecordTarget::Concrete(id) => (self.nested_entry(id)?, items),
                    RecordTarget::Polymorphic(base) => match items.split_first() {
                        Some((StorageValue::Text(d), rest)) => (self.variant_entry(base, d)?, rest),
                        _ => {
                            return Err(MappingError::hydration(
                                "embedded list does not start with a discriminator",
                            ))
                        }
                    },
                };
                let mut object = instantiate(&entry)?;
                for (field, item) in entry.fields.iter().zip(values) {
                    self.hydrate_field(object.as_mut(), field, item, loader)?;
                }
                Ok(Value::Object(object))
            }
            ValuePlan::Reference { target } => {
                let (entry, key) = match target {
                    RecordTarget::Concrete(id) => (self.nested_entry(id)?, stored),
                    RecordTarget::Polymorphic(base) => match stored.as_list() {
                        Some([key, StorageValue::Text(d)]) => (self.variant_entry(base, d)?, key),
                        _ => {
                            return Err(MappingError::hydration(format!(
                                "expected [key, discriminator] reference, found {}",
                                stored.kind_name()
                            )))
                        }
                    },
                };
                loader.load(self, &entry, key).map(Value::Object)
            }
            ValuePlan::List(element) => stored
                .as_list()
                .ok_or_else(|| unexpected("list", stored))?
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    self.storage_to_value(item, element, loader)
                        .map_err(|e| e.within(&format!("[{i}]")))
                })
                .collect::<MappingResult<Vec<_>>>()
                .map(Value::List),
            ValuePlan::Map { key, value } => stored
                .as_map()
                .ok_or_else(|| unexpected("map", stored))?
                .iter()
                .map(|(name, item)| {
                    let k = key_from_string(*key, name).map_err(|e| e.within(&format!("[{name}]")))?;
                    let v = self
                        .storage_to_value(item, value, loader)
                        .map_err(|e| e.within(&format!("[{name}]")))?;
                    Ok((k, v))
                })
                .collect::<MappingResult<Vec<_>>>()
                .map(Value::Map),
        }
    }

    // ---- Entry selection ----

    fn nested_entry(&self, id: &ClassId) -> MappingResult<Arc<ClassMetadataEntry>> {
        Ok(self.resolve_nested(id)?)
    }

    /// The concrete entry for an object stored through `entry`.
    fn runtime_entry<'e>(
        &self,
        entry: &'e ClassMetadataEntry,
        class: &ClassId,
    ) -> MappingResult<EntryRef<'e>> {
        if entry.id == *class {
            return Ok(EntryRef::Borrowed(entry));
        }
        match entry.polymorphism() {
            Some(table) if table.contains(class) => {
                self.nested_entry(class).map(EntryRef::Shared)
            }
            _ => Err(mismatch(&entry.id, class)),
        }
    }

    /// The concrete entry for an object held by a nested field.
    fn target_entry(
        &self,
        target: &RecordTarget,
        class: &ClassId,
    ) -> MappingResult<Arc<ClassMetadataEntry>> {
        match target {
            RecordTarget::Concrete(id) if id == class => self.nested_entry(id),
            RecordTarget::Concrete(id) => Err(mismatch(id, class)),
            RecordTarget::Polymorphic(base) => {
                let base_entry = self.nested_entry(base)?;
                match base_entry.polymorphism() {
                    Some(table) if table.contains(class) => self.nested_entry(class),
                    _ => Err(mismatch(base, class)),
                }
            }
        }
    }

    fn variant_entry(
        &self,
        base: &ClassId,
        discriminator: &str,
    ) -> MappingResult<Arc<ClassMetadataEntry>> {
        let base_entry = self.nested_entry(base)?;
        let variant = base_entry
            .polymorphism()
            .and_then(|table| table.variant(discriminator))
            .ok_or_else(|| MappingError::UnknownVariant {
                base: base.clone(),
                discriminator: discriminator.to_string(),
                path: String::new(),
            })?;
        self.nested_entry(variant)
    }
}

fn field_value(object: &dyn Entity, field: &FieldMapping) -> MappingResult<Value> {
    object.get_field(&field.name).ok_or_else(|| {
        MappingError::conversion(format!("{} does not expose this field", object.class_id()))
            .within(&field.name)
    })
}

fn set_field(object: &mut dyn Entity, field: &FieldMapping, value: Value) -> MappingResult<()> {
    object
        .set_field(&field.name, value)
        .map_err(|e| MappingError::hydration(e).within(&field.name))
}

fn instantiate(entry: &ClassMetadataEntry) -> MappingResult<Box<dyn Entity>> {
    entry
        .instantiate()
        .ok_or_else(|| MappingError::hydration(format!("{} is abstract", entry.id)))
}

fn as_object(value: &Value) -> MappingResult<&dyn Entity> {
    match value {
        Value::Object(object) => Ok(object.as_ref()),
        other => Err(MappingError::conversion(format!(
            "expected object, found {}",
            other.kind_name()
        ))),
    }
}

fn discriminator_of(entry: &ClassMetadataEntry) -> String {
    entry
        .discriminator
        .clone()
        .unwrap_or_else(|| entry.id.simple_name().to_string())
}

fn stored_discriminator(bins: &BTreeMap<String, StorageValue>) -> MappingResult<&str> {
    bins.get(TYPE_KEY)
        .and_then(StorageValue::as_str)
        .ok_or_else(|| MappingError::hydration("missing \"@type\" discriminator"))
}

fn mismatch(expected: &ClassId, found: &ClassId) -> MappingError {
    MappingError::ClassMismatch {
        expected: expected.clone(),
        found: found.clone(),
        path: String::new(),
    }
}

fn unexpected(expected: &str, found: &StorageValue) -> MappingError {
    MappingError::hydration(format!("expected {expected}, found {}", found.kind_name()))
}

fn key_to_string(kind: KeyKind, key: &Value) -> MappingResult<String> {
    match (kind, key) {
        (KeyKind::Text, Value::Text(s)) => Ok(s.clone()),
        (KeyKind::Int, Value::Int(i)) => Ok(i.to_string()),
        (KeyKind::Bool, Value::Bool(b)) => Ok(b.to_string()),
        (KeyKind::Enum, Value::Enum(name) | Value::Text(name)) => Ok(name.clone()),
        (KeyKind::Uuid, Value::Uuid(u)) => Ok(u.to_string()),
        (kind, other) => Err(MappingError::conversion(format!(
            "expected {kind:?} map key, found {}",
            other.kind_name()
        ))),
    }
}

fn key_from_string(kind: KeyKind, key: &str) -> MappingResult<Value> {
    match kind {
        KeyKind::Text => Ok(Value::Text(key.to_string())),
        KeyKind::Enum => Ok(Value::Enum(key.to_string())),
        KeyKind::Int => key
            .parse()
            .map(Value::Int)
            .map_err(|e| MappingError::hydration(format!("map key {key:?}: {e}"))),
        KeyKind::Bool => key
            .parse()
            .map(Value::Bool)
            .map_err(|e| MappingError::hydration(format!("map key {key:?}: {e}"))),
        KeyKind::Uuid => Uuid::parse_str(key)
            .map(Value::Uuid)
            .map_err(|e| MappingError::hydration(format!("map key {key:?}: {e}"))),
    }
}
