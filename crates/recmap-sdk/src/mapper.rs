use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use recmap_convert::{Converter, ConverterRegistry, TypedConverter};
use recmap_metadata::{
    ClassMetadataEntry, LoadReport, MappingError, MappingResult, MetadataCache, MetadataError,
    ReferenceLoader,
};
use recmap_schema::{ClassCatalog, ClassSchema, MapperConfig, Record};
use recmap_types::{downcast, ClassId, Entity, StorageRecord, StorageValue, TypeTag};
use tracing::{debug, info};

use crate::error::SdkResult;
use crate::store::{InMemoryRecordStore, RecordKey, RecordStore, UserKey, WritePolicy};

/// Collects converters, classes and configuration before any class is
/// resolved.
pub struct MapperBuilder {
    catalog: ClassCatalog,
    registry: ConverterRegistry,
    default_namespace: Option<String>,
    configurations: Vec<(MapperConfig, bool)>,
    preload: Vec<ClassId>,
    store: Option<Arc<dyn RecordStore>>,
}

impl MapperBuilder {
    pub fn new() -> Self {
        Self {
            catalog: ClassCatalog::new(),
            registry: ConverterRegistry::new(),
            default_namespace: None,
            configurations: Vec::new(),
            preload: Vec::new(),
            store: None,
        }
    }

    pub fn add_converter(
        self,
        tag: impl Into<TypeTag>,
        converter: impl Converter + 'static,
    ) -> SdkResult<Self> {
        self.registry.register(tag, converter)?;
        Ok(self)
    }

    pub fn add_typed_converter<C: TypedConverter>(
        self,
        tag: impl Into<TypeTag>,
        converter: C,
    ) -> SdkResult<Self> {
        self.registry.register_typed(tag, converter)?;
        Ok(self)
    }

    /// Make a record class known to the mapper.
    pub fn register<T: Record>(self) -> SdkResult<Self> {
        self.catalog.register::<T>()?;
        Ok(self)
    }

    /// Register an abstract record root that variants name in
    /// `implements`.
    pub fn register_abstract(self, id: impl Into<ClassId>, schema: ClassSchema) -> SdkResult<Self> {
        self.catalog.register_abstract(id, schema)?;
        Ok(self)
    }

    /// Namespace for classes that neither declare nor inherit one.
    pub fn default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = Some(namespace.into());
        self
    }

    /// Resolve `id` during [`build`](Self::build).
    pub fn preload_class(mut self, id: impl Into<ClassId>) -> Self {
        self.preload.push(id.into());
        self
    }

    /// Apply a configuration document during [`build`](Self::build),
    /// before any preloading.
    pub fn configuration(mut self, config: MapperConfig, allows_invalid: bool) -> Self {
        self.configurations.push((config, allows_invalid));
        self
    }

    /// Backing store. Defaults to an [`InMemoryRecordStore`].
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> SdkResult<Mapper> {
        let mut cache = MetadataCache::new(Arc::new(self.catalog), Arc::new(self.registry));
        if let Some(namespace) = self.default_namespace {
            cache = cache.with_default_namespace(namespace);
        }
        for (config, allows_invalid) in &self.configurations {
            cache.load_configuration(config, *allows_invalid)?;
        }
        for id in &self.preload {
            cache.preload(id)?;
        }
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryRecordStore::new()));

        info!(
            classes = cache.catalog().len(),
            resolved = cache.len(),
            "mapper ready"
        );
        Ok(Mapper { cache, store })
    }
}

impl Default for MapperBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps [`Entity`] objects to storage records and moves them through a
/// [`RecordStore`].
///
/// Every operation resolves the class's metadata on first use. Reads
/// follow references into the store; a reference back to a record still
/// being read comes back as a key-only stub.
pub struct Mapper {
    cache: MetadataCache,
    store: Arc<dyn RecordStore>,
}

impl Mapper {
    pub fn builder() -> MapperBuilder {
        MapperBuilder::new()
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    // ---- Metadata ----

    pub fn resolve_metadata(&self, id: &ClassId) -> SdkResult<Arc<ClassMetadataEntry>> {
        Ok(self.cache.resolve(id)?)
    }

    /// Register a converter. Fails once any class has been resolved.
    pub fn register_converter(
        &self,
        tag: impl Into<TypeTag>,
        converter: impl Converter + 'static,
    ) -> SdkResult<()> {
        Ok(self.cache.registry().register(tag, converter)?)
    }

    pub fn preload(&self, id: &ClassId) -> SdkResult<()> {
        Ok(self.cache.preload(id)?)
    }

    pub fn load_configuration(
        &self,
        config: &MapperConfig,
        allows_invalid: bool,
    ) -> SdkResult<LoadReport> {
        Ok(self.cache.load_configuration(config, allows_invalid)?)
    }

    // ---- Conversion ----

    pub fn to_storage(&self, object: &dyn Entity) -> SdkResult<StorageRecord> {
        let entry = self.resolve_metadata(&object.class_id())?;
        Ok(self.cache.to_storage(object, &entry)?)
    }

    pub fn key_of(&self, object: &dyn Entity) -> SdkResult<StorageValue> {
        let entry = self.resolve_metadata(&object.class_id())?;
        Ok(self.cache.key_of(object, &entry)?)
    }

    /// Hydrate a record of class `id`. References come back as stubs.
    pub fn from_storage(&self, record: &StorageRecord, id: &ClassId) -> SdkResult<Box<dyn Entity>> {
        let entry = self.resolve_metadata(id)?;
        Ok(self.cache.from_storage(record, &entry)?)
    }

    pub fn from_storage_as<T: Record>(&self, record: &StorageRecord) -> SdkResult<T> {
        let object = self.from_storage(record, &ClassId::of::<T>())?;
        Ok(downcast::<T>(object)?)
    }

    // ---- Store operations ----

    /// Store `object` under its class's namespace and set.
    pub fn save(&self, object: &dyn Entity) -> SdkResult<RecordKey> {
        self.save_inner(None, object)
    }

    /// Store `object` in `namespace` instead of its class's namespace.
    pub fn save_in(&self, namespace: &str, object: &dyn Entity) -> SdkResult<RecordKey> {
        self.save_inner(Some(namespace), object)
    }

    fn save_inner(&self, namespace: Option<&str>, object: &dyn Entity) -> SdkResult<RecordKey> {
        let entry = self.resolve_metadata(&object.class_id())?;
        let key = self.cache.key_of(object, &entry)?;
        let record = self.cache.to_storage(object, &entry)?;
        let address = record_key(&entry, namespace, key)?;
        self.store.put(&address, &record, &write_policy(&entry))?;
        debug!(class = %entry.id(), key = %address, bins = record.len(), "saved record");
        Ok(address)
    }

    pub fn read<T: Record>(&self, key: impl Into<StorageValue>) -> SdkResult<Option<T>> {
        self.read_inner(None, key.into())
    }

    pub fn read_in<T: Record>(
        &self,
        namespace: &str,
        key: impl Into<StorageValue>,
    ) -> SdkResult<Option<T>> {
        self.read_inner(Some(namespace), key.into())
    }

    fn read_inner<T: Record>(&self, namespace: Option<&str>, key: StorageValue) -> SdkResult<Option<T>> {
        let entry = self.resolve_metadata(&ClassId::of::<T>())?;
        match self.read_entry(&entry, namespace, key)? {
            Some(object) => Ok(Some(downcast::<T>(object)?)),
            None => Ok(None),
        }
    }

    /// Read through any resolvable class, including an abstract root, in
    /// which case the stored discriminator picks the variant.
    pub fn read_entity(
        &self,
        id: &ClassId,
        key: impl Into<StorageValue>,
    ) -> SdkResult<Option<Box<dyn Entity>>> {
        let entry = self.resolve_metadata(id)?;
        self.read_entry(&entry, None, key.into())
    }

    fn read_entry(
        &self,
        entry: &ClassMetadataEntry,
        namespace: Option<&str>,
        key: StorageValue,
    ) -> SdkResult<Option<Box<dyn Entity>>> {
        let address = record_key(entry, namespace, key)?;
        let Some(record) = self.store.get(&address)? else {
            debug!(class = %entry.id(), key = %address, "record not found");
            return Ok(None);
        };
        let loader = StoreLoader::new(self.store.as_ref(), address);
        let object = self.cache.from_storage_with(&record, entry, &loader)?;
        Ok(Some(object))
    }

    pub fn delete(&self, object: &dyn Entity) -> SdkResult<bool> {
        let entry = self.resolve_metadata(&object.class_id())?;
        let key = self.cache.key_of(object, &entry)?;
        self.delete_entry(&entry, key)
    }

    pub fn delete_by_key<T: Record>(&self, key: impl Into<StorageValue>) -> SdkResult<bool> {
        let entry = self.resolve_metadata(&ClassId::of::<T>())?;
        self.delete_entry(&entry, key.into())
    }

    fn delete_entry(&self, entry: &ClassMetadataEntry, key: StorageValue) -> SdkResult<bool> {
        let address = record_key(entry, None, key)?;
        let existed = self.store.delete(&address, &write_policy(entry))?;
        debug!(class = %entry.id(), key = %address, existed, "deleted record");
        Ok(existed)
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

fn record_key(
    entry: &ClassMetadataEntry,
    namespace: Option<&str>,
    key: StorageValue,
) -> SdkResult<RecordKey> {
    let namespace = namespace
        .or(entry.namespace())
        .ok_or_else(|| MetadataError::MissingNamespace(entry.id().clone()))?;
    Ok(RecordKey::new(
        namespace,
        entry.set().map(str::to_string),
        UserKey::try_from(key)?,
    ))
}

fn write_policy(entry: &ClassMetadataEntry) -> WritePolicy {
    WritePolicy {
        expiration: entry.ttl(),
        durable_delete: entry.durable_delete(),
        send_key: entry.send_key(),
    }
}

/// Loads referenced records from the store while one read is in progress.
struct StoreLoader<'s> {
    store: &'s dyn RecordStore,
    loading: RefCell<HashSet<RecordKey>>,
}

impl<'s> StoreLoader<'s> {
    fn new(store: &'s dyn RecordStore, root: RecordKey) -> Self {
        Self {
            store,
            loading: RefCell::new(HashSet::from([root])),
        }
    }
}

impl ReferenceLoader for StoreLoader<'_> {
    fn load(
        &self,
        cache: &MetadataCache,
        entry: &ClassMetadataEntry,
        key: &StorageValue,
    ) -> MappingResult<Box<dyn Entity>> {
        let address = record_key(entry, None, key.clone()).map_err(hydration)?;
        if self.loading.borrow().contains(&address) {
            return cache.stub(entry, key);
        }
        let record = self.store.get(&address).map_err(hydration)?;
        let Some(record) = record else {
            debug!(key = %address, "dangling reference");
            return cache.stub(entry, key);
        };

        self.loading.borrow_mut().insert(address.clone());
        let loaded = cache.from_storage_with(&record, entry, self);
        self.loading.borrow_mut().remove(&address);
        loaded
    }
}

fn hydration(err: impl fmt::Display) -> MappingError {
    MappingError::Hydration {
        path: String::new(),
        reason: err.to_string(),
    }
}
