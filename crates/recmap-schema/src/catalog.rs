//! The set of classes visible to the mapper.
//!
//! The catalog stands in for class-path scanning: every concrete record
//! class and every abstract record root must be registered here before the
//! metadata engine resolves anything that can reach it. Polymorphic variant
//! discovery walks the `implements` edges recorded in each schema.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use recmap_types::{ClassId, Entity};
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};
use crate::schema::{ClassSchema, Record};

/// Whether a class can be instantiated.
#[derive(Clone, Copy)]
pub enum ClassKind {
    /// A Rust type with a default constructor.
    Concrete { factory: fn() -> Box<dyn Entity> },
    /// A record root with no instances of its own.
    Abstract,
}

impl fmt::Debug for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concrete { .. } => write!(f, "Concrete"),
            Self::Abstract => write!(f, "Abstract"),
        }
    }
}

/// A catalog entry.
#[derive(Clone, Debug)]
pub struct ClassDescriptor {
    pub id: ClassId,
    pub schema: ClassSchema,
    pub kind: ClassKind,
}

impl ClassDescriptor {
    /// Descriptor for a [`Record`] type.
    pub fn of<T: Record>() -> Self {
        Self {
            id: ClassId::of::<T>(),
            schema: T::schema(),
            kind: ClassKind::Concrete {
                factory: new_boxed::<T>,
            },
        }
    }

    /// Descriptor for an abstract record root.
    pub fn abstract_root(id: impl Into<ClassId>, schema: ClassSchema) -> Self {
        Self {
            id: id.into(),
            schema,
            kind: ClassKind::Abstract,
        }
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self.kind, ClassKind::Abstract)
    }

    /// A fresh default instance, or `None` for abstract roots.
    pub fn instantiate(&self) -> Option<Box<dyn Entity>> {
        match self.kind {
            ClassKind::Concrete { factory } => Some(factory()),
            ClassKind::Abstract => None,
        }
    }
}

fn new_boxed<T: Record>() -> Box<dyn Entity> {
    Box::new(T::default())
}

#[derive(Default)]
struct CatalogState {
    classes: HashMap<ClassId, Arc<ClassDescriptor>>,
    sealed: bool,
}

/// Thread-safe, append-only class catalog.
#[derive(Default)]
pub struct ClassCatalog {
    state: RwLock<CatalogState>,
}

impl ClassCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a concrete [`Record`] type.
    pub fn register<T: Record>(&self) -> SchemaResult<()> {
        self.register_descriptor(ClassDescriptor::of::<T>())
    }

    /// Register an abstract record root.
    pub fn register_abstract(&self, id: impl Into<ClassId>, schema: ClassSchema) -> SchemaResult<()> {
        self.register_descriptor(ClassDescriptor::abstract_root(id, schema))
    }

    pub fn register_descriptor(&self, descriptor: ClassDescriptor) -> SchemaResult<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.sealed {
            return Err(SchemaError::CatalogSealed(descriptor.id));
        }
        if state.classes.contains_key(&descriptor.id) {
            return Err(SchemaError::DuplicateClass(descriptor.id));
        }
        debug!(
            class = %descriptor.id,
            kind = ?descriptor.kind,
            fields = descriptor.schema.fields.len(),
            "registered class"
        );
        state
            .classes
            .insert(descriptor.id.clone(), Arc::new(descriptor));
        Ok(())
    }

    pub fn get(&self, id: &ClassId) -> Option<Arc<ClassDescriptor>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.classes.get(id).cloned()
    }

    pub fn contains(&self, id: &ClassId) -> bool {
        self.get(id).is_some()
    }

    /// Find a class by full id, or by simple name if that is unique.
    pub fn find_by_name(&self, name: &str) -> SchemaResult<Arc<ClassDescriptor>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(descriptor) = state.classes.get(&ClassId::new(name)) {
            return Ok(Arc::clone(descriptor));
        }
        let mut candidates: Vec<&Arc<ClassDescriptor>> = state
            .classes
            .values()
            .filter(|d| d.id.simple_name() == name)
            .collect();
        match candidates.len() {
            0 => Err(SchemaError::ClassNotFound(name.to_string())),
            1 => Ok(Arc::clone(candidates[0])),
            _ => {
                candidates.sort_by(|a, b| a.id.cmp(&b.id));
                Err(SchemaError::AmbiguousClass {
                    name: name.to_string(),
                    candidates: candidates.iter().map(|d| d.id.clone()).collect(),
                })
            }
        }
    }

    /// All bases of `id`, nearest first, each listed once.
    pub fn ancestors(&self, id: &ClassId) -> Vec<ClassId> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<ClassId> = state
            .classes
            .get(id)
            .map(|d| d.schema.implements.iter().cloned().collect())
            .unwrap_or_default();
        while let Some(base) = queue.pop_front() {
            if !seen.insert(base.clone()) {
                continue;
            }
            if let Some(descriptor) = state.classes.get(&base) {
                queue.extend(descriptor.schema.implements.iter().cloned());
            }
            order.push(base);
        }
        order
    }

    /// Every concrete class that implements `base` directly or through
    /// intermediate bases, sorted by id.
    pub fn implementors(&self, base: &ClassId) -> Vec<Arc<ClassDescriptor>> {
        let candidates: Vec<Arc<ClassDescriptor>> = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            state
                .classes
                .values()
                .filter(|d| !d.is_abstract())
                .cloned()
                .collect()
        };
        let mut found: Vec<Arc<ClassDescriptor>> = candidates
            .into_iter()
            .filter(|d| self.ancestors(&d.id).contains(base))
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Reject further registrations. Idempotent.
    pub fn seal(&self) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.state.read().unwrap_or_else(PoisonError::into_inner).sealed
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .classes
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ClassCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassCatalog")
            .field("class_count", &self.len())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}
