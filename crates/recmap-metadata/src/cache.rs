use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use recmap_convert::ConverterRegistry;
use recmap_schema::{ClassCatalog, ClassConfig, MapperConfig};
use recmap_types::ClassId;
use tracing::{debug, info, warn};

use crate::build::{BuildSession, Staged};
use crate::entry::ClassMetadataEntry;
use crate::error::{ConfigurationError, ConfigurationResult, MetadataError, MetadataResult};

/// Outcome of a configuration load.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Classes resolved with their configuration applied.
    pub loaded: Vec<ClassId>,
    /// Entries skipped under `allows_invalid`, by configured class name.
    pub skipped: Vec<(String, ConfigurationError)>,
}

#[derive(Default)]
struct BuildState {
    overrides: HashMap<ClassId, ClassConfig>,
}

/// Lazily populated class identity → [`ClassMetadataEntry`] registry.
///
/// Readers take a shared lock on the published map. Builds are serialized
/// behind one mutex and re-check the map after acquiring it, so each class
/// is built at most once. A build stages the requested class together with
/// everything reachable from it and publishes all of it in a single write,
/// or nothing at all.
///
/// The first build seals the converter registry and the class catalog.
pub struct MetadataCache {
    catalog: Arc<ClassCatalog>,
    registry: Arc<ConverterRegistry>,
    default_namespace: Option<String>,
    entries: RwLock<HashMap<ClassId, Arc<ClassMetadataEntry>>>,
    build: Mutex<BuildState>,
    builds: AtomicUsize,
}

impl MetadataCache {
    pub fn new(catalog: Arc<ClassCatalog>, registry: Arc<ConverterRegistry>) -> Self {
        Self {
            catalog,
            registry,
            default_namespace: None,
            entries: RwLock::new(HashMap::new()),
            build: Mutex::new(BuildState::default()),
            builds: AtomicUsize::new(0),
        }
    }

    /// Namespace for classes that declare none and inherit none.
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = Some(namespace.into());
        self
    }

    pub fn catalog(&self) -> &ClassCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// A published entry, without building.
    pub fn get(&self, id: &ClassId) -> Option<Arc<ClassMetadataEntry>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(id).cloned()
    }

    pub fn is_resolved(&self, id: &ClassId) -> bool {
        self.get(id).is_some()
    }

    /// Number of published entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries constructed so far, including discarded ones.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    pub(crate) fn record_build(&self) {
        self.builds.fetch_add(1, Ordering::Relaxed);
    }

    /// Resolve a storable class: memoized, built on first access.
    ///
    /// Fails with [`MetadataError::MissingNamespace`] if the class ends up
    /// without a namespace.
    pub fn resolve(&self, id: &ClassId) -> MetadataResult<Arc<ClassMetadataEntry>> {
        self.obtain(id, true)
    }

    /// [`resolve`](Self::resolve) by Rust type.
    pub fn resolve_type<T: 'static>(&self) -> MetadataResult<Arc<ClassMetadataEntry>> {
        self.resolve(&ClassId::of::<T>())
    }

    /// Resolve eagerly, discarding the entry.
    pub fn preload(&self, id: &ClassId) -> MetadataResult<()> {
        self.resolve(id).map(|_| ())
    }

    /// Resolve without the namespace requirement. Used for nested targets,
    /// which may be embedded-only classes.
    pub(crate) fn resolve_nested(&self, id: &ClassId) -> MetadataResult<Arc<ClassMetadataEntry>> {
        self.obtain(id, false)
    }

    fn obtain(&self, id: &ClassId, storable: bool) -> MetadataResult<Arc<ClassMetadataEntry>> {
        if let Some(entry) = self.get(id) {
            return check_storable(entry, storable);
        }

        let state = self.lock_build();
        if let Some(entry) = self.get(id) {
            return check_storable(entry, storable);
        }
        self.seal();

        let mut session = BuildSession::new(self, &state.overrides);
        let entry = check_storable(session.build_root(id)?, storable)?;
        self.publish(session.into_staged());
        Ok(entry)
    }

    /// Apply a configuration document and resolve every class it names.
    ///
    /// With `allows_invalid = false` the document is validated and built as
    /// one unit: the first failure aborts the load and nothing is
    /// published. With `allows_invalid = true` entries that do not resolve
    /// as storable roots are dropped along with their overrides, logged and
    /// reported in [`LoadReport::skipped`]; the rest are then built and
    /// published together. The outcome does not depend on entry order.
    pub fn load_configuration(
        &self,
        config: &MapperConfig,
        allows_invalid: bool,
    ) -> ConfigurationResult<LoadReport> {
        let mut state = self.lock_build();
        self.seal();

        let mut report = LoadReport::default();
        let mut seen = HashSet::new();
        let mut accepted = Vec::new();
        for class_config in &config.classes {
            match self.check_config(class_config, &mut seen) {
                Ok(id) => accepted.push((id, class_config.clone())),
                Err(err) if allows_invalid => {
                    warn!(class = %class_config.class, error = %err, "skipping class configuration");
                    report.skipped.push((class_config.class.clone(), err));
                }
                Err(err) => return Err(err),
            }
        }

        let accepted = if allows_invalid {
            self.settle(&state.overrides, accepted, &mut report)
        } else {
            accepted
        };
        let overrides = with_configs(&state.overrides, &accepted);
        let staged = self.build_all(&overrides, &accepted)?;
        state.overrides = overrides;
        self.publish(staged);
        report.loaded = accepted.into_iter().map(|(id, _)| id).collect();

        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            allows_invalid,
            "configuration loaded"
        );
        Ok(report)
    }

    /// Drop every configured class that does not resolve as a storable
    /// root. Each entry is first tried against its own configuration alone,
    /// then the survivors are tried together until all of them build.
    fn settle(
        &self,
        base: &HashMap<ClassId, ClassConfig>,
        mut candidates: Vec<(ClassId, ClassConfig)>,
        report: &mut LoadReport,
    ) -> Vec<(ClassId, ClassConfig)> {
        candidates.retain(|candidate| {
            let overrides = with_configs(base, std::slice::from_ref(candidate));
            self.keep(&overrides, candidate, report)
        });
        loop {
            let before = candidates.len();
            let overrides = with_configs(base, &candidates);
            candidates.retain(|candidate| self.keep(&overrides, candidate, report));
            if candidates.len() == before {
                return candidates;
            }
        }
    }

    fn keep(
        &self,
        overrides: &HashMap<ClassId, ClassConfig>,
        (id, class_config): &(ClassId, ClassConfig),
        report: &mut LoadReport,
    ) -> bool {
        let built = BuildSession::new(self, overrides)
            .build_root(id)
            .and_then(|entry| check_storable(entry, true));
        match built {
            Ok(_) => true,
            Err(source) => {
                let err = ConfigurationError::Invalid {
                    class: id.clone(),
                    source,
                };
                warn!(class = %id, error = %err, "skipping class configuration");
                report.skipped.push((class_config.class.clone(), err));
                false
            }
        }
    }

    /// Build `classes` as storable roots in one session.
    fn build_all(
        &self,
        overrides: &HashMap<ClassId, ClassConfig>,
        classes: &[(ClassId, ClassConfig)],
    ) -> ConfigurationResult<Staged> {
        let mut session = BuildSession::new(self, overrides);
        for (id, _) in classes {
            session
                .build_root(id)
                .and_then(|entry| check_storable(entry, true))
                .map_err(|source| ConfigurationError::Invalid {
                    class: id.clone(),
                    source,
                })?;
        }
        Ok(session.into_staged())
    }

    fn check_config(
        &self,
        config: &ClassConfig,
        seen: &mut HashSet<ClassId>,
    ) -> ConfigurationResult<ClassId> {
        let descriptor = self.catalog.find_by_name(&config.class)?;
        let id = descriptor.id.clone();
        if !seen.insert(id.clone()) {
            return Err(ConfigurationError::DuplicateEntry(id));
        }
        if self.is_resolved(&id) {
            return Err(ConfigurationError::AlreadyResolved(id));
        }
        descriptor.schema.with_overrides(&id, config)?;
        Ok(id)
    }

    fn lock_build(&self) -> MutexGuard<'_, BuildState> {
        self.build.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn seal(&self) {
        self.registry.seal();
        self.catalog.seal();
    }

    fn publish(&self, staged: Staged) {
        if staged.is_empty() {
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        debug!(classes = staged.len(), "published class metadata");
        entries.extend(staged);
    }
}

fn with_configs(
    base: &HashMap<ClassId, ClassConfig>,
    classes: &[(ClassId, ClassConfig)],
) -> HashMap<ClassId, ClassConfig> {
    let mut overrides = base.clone();
    overrides.extend(classes.iter().cloned());
    overrides
}

fn check_storable(
    entry: Arc<ClassMetadataEntry>,
    storable: bool,
) -> MetadataResult<Arc<ClassMetadataEntry>> {
    if storable && entry.namespace.is_none() {
        return Err(MetadataError::MissingNamespace(entry.id.clone()));
    }
    Ok(entry)
}

impl fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataCache")
            .field("entries", &self.len())
            .field("builds", &self.builds())
            .field("default_namespace", &self.default_namespace)
            .finish()
    }
}
