//! Staged construction of class metadata.
//!
//! A [`BuildSession`] resolves a root class and every class reachable from
//! it (nested records, references, polymorphic variants) into a private
//! staging map. Nothing becomes visible to readers until the cache
//! publishes the whole session, so a failure anywhere discards everything.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use recmap_schema::{ClassConfig, ClassDescriptor, ClassKind, ClassSchema};
use recmap_types::ClassId;
use tracing::debug;

use crate::cache::MetadataCache;
use crate::entry::{ClassMetadataEntry, RecordTarget, ValuePlan};
use crate::error::{MetadataError, MetadataResult};
use crate::polymorphism::PolymorphismTable;
use crate::resolver::TypeResolver;

pub(crate) type Staged = HashMap<ClassId, Arc<ClassMetadataEntry>>;

pub(crate) struct BuildSession<'a> {
    cache: &'a MetadataCache,
    overrides: &'a HashMap<ClassId, ClassConfig>,
    staged: Staged,
    queue: VecDeque<ClassId>,
}

impl<'a> BuildSession<'a> {
    pub fn new(cache: &'a MetadataCache, overrides: &'a HashMap<ClassId, ClassConfig>) -> Self {
        Self {
            cache,
            overrides,
            staged: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    /// Stage `root` and its closure, then validate the staged graph.
    pub fn build_root(&mut self, root: &ClassId) -> MetadataResult<Arc<ClassMetadataEntry>> {
        self.require(root);
        while let Some(id) = self.queue.pop_front() {
            if self.lookup(&id).is_some() {
                continue;
            }
            let entry = self.build_entry(&id)?;
            self.staged.insert(id, Arc::new(entry));
        }
        self.validate_references()?;
        self.validate_embedding()?;
        self.lookup(root)
            .ok_or_else(|| MetadataError::UnknownClass(root.clone()))
    }

    pub fn into_staged(self) -> Staged {
        self.staged
    }

    fn require(&mut self, id: &ClassId) {
        if self.lookup(id).is_none() {
            self.queue.push_back(id.clone());
        }
    }

    fn lookup(&self, id: &ClassId) -> Option<Arc<ClassMetadataEntry>> {
        self.staged
            .get(id)
            .cloned()
            .or_else(|| self.cache.get(id))
    }

    fn descriptor(&self, id: &ClassId) -> MetadataResult<Arc<ClassDescriptor>> {
        self.cache
            .catalog()
            .get(id)
            .ok_or_else(|| MetadataError::UnknownClass(id.clone()))
    }

    /// Declared schema with any configured overrides applied.
    fn effective_schema(&self, descriptor: &ClassDescriptor) -> MetadataResult<ClassSchema> {
        match self.overrides.get(&descriptor.id) {
            Some(config) => Ok(descriptor.schema.with_overrides(&descriptor.id, config)?),
            None => Ok(descriptor.schema.clone()),
        }
    }

    fn discriminator_for(&self, id: &ClassId) -> MetadataResult<String> {
        let descriptor = self.descriptor(id)?;
        let schema = self.effective_schema(&descriptor)?;
        Ok(schema
            .discriminator
            .unwrap_or_else(|| id.simple_name().to_string()))
    }

    fn build_entry(&mut self, id: &ClassId) -> MetadataResult<ClassMetadataEntry> {
        let cache = self.cache;
        let descriptor = self.descriptor(id)?;
        let schema = self.effective_schema(&descriptor)?;

        for base in &schema.implements {
            if !self.descriptor(base)?.is_abstract() {
                return Err(MetadataError::NotAbstract {
                    class: id.clone(),
                    base: base.clone(),
                });
            }
        }

        let ancestors = cache.catalog().ancestors(id);
        let mut namespace = schema.namespace.clone();
        let mut set = schema.set.clone();
        for base in &ancestors {
            if namespace.is_some() && set.is_some() {
                break;
            }
            let base_descriptor = self.descriptor(base)?;
            let base_schema = self.effective_schema(&base_descriptor)?;
            namespace = namespace.or(base_schema.namespace);
            set = set.or(base_schema.set);
        }
        let namespace = namespace.or_else(|| cache.default_namespace().map(str::to_string));

        let (fields, key_index, discriminator, polymorphism, factory) = match descriptor.kind {
            ClassKind::Abstract => {
                let variants = cache
                    .catalog()
                    .implementors(id)
                    .into_iter()
                    .map(|variant| {
                        self.discriminator_for(&variant.id)
                            .map(|d| (variant.id.clone(), d))
                    })
                    .collect::<MetadataResult<Vec<_>>>()?;
                let table = PolymorphismTable::build(id.clone(), variants)?;
                for (_, variant) in table.variants() {
                    self.require(variant);
                }
                (Vec::new(), None, None, Some(Arc::new(table)), None)
            }
            ClassKind::Concrete { factory } => {
                let resolver = TypeResolver {
                    catalog: cache.catalog(),
                    registry: cache.registry(),
                };
                let (fields, key_index) = resolver.resolve_fields(id, &schema)?;
                let mut targets = Vec::new();
                for field in &fields {
                    field
                        .plan
                        .for_each_target(&mut |t| targets.push(t.class_id().clone()));
                }
                for target in &targets {
                    self.require(target);
                }
                let discriminator = if ancestors.is_empty() {
                    None
                } else {
                    Some(
                        schema
                            .discriminator
                            .clone()
                            .unwrap_or_else(|| id.simple_name().to_string()),
                    )
                };
                (fields, key_index, discriminator, None, Some(factory))
            }
        };

        cache.record_build();
        debug!(
            class = %id,
            namespace = ?namespace,
            set = ?set,
            fields = fields.len(),
            discriminator = ?discriminator,
            variants = polymorphism.as_ref().map_or(0, |t| t.len()),
            "built class metadata"
        );

        Ok(ClassMetadataEntry {
            id: id.clone(),
            namespace,
            set,
            ttl: schema.ttl,
            durable_delete: schema.durable_delete,
            send_key: schema.send_key,
            fields,
            key_index,
            discriminator,
            polymorphism,
            factory,
        })
    }

    /// Concrete classes a target can hold at runtime.
    fn concrete_classes(&self, target: &RecordTarget) -> Vec<ClassId> {
        match target {
            RecordTarget::Concrete(id) => vec![id.clone()],
            RecordTarget::Polymorphic(base) => self
                .lookup(base)
                .and_then(|entry| {
                    entry
                        .polymorphism()
                        .map(|t| t.variants().map(|(_, c)| c.clone()).collect())
                })
                .unwrap_or_default(),
        }
    }

    fn sorted_staged(&self) -> Vec<Arc<ClassMetadataEntry>> {
        let mut entries: Vec<_> = self.staged.values().cloned().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Every referenced class must have a key field.
    fn validate_references(&self) -> MetadataResult<()> {
        for entry in self.sorted_staged() {
            for field in &entry.fields {
                let mut edges = Edges::default();
                edges.walk(&field.plan, field.nullable);
                for target in edges.references {
                    for class in self.concrete_classes(target) {
                        let keyed = self
                            .lookup(&class)
                            .is_some_and(|e| e.key_field().is_some());
                        if !keyed {
                            return Err(MetadataError::UnkeyedReference {
                                class: entry.id.clone(),
                                field: field.name.clone(),
                                target: class,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Mandatory embedding must not loop. An edge through a nullable field
    /// or a collection element terminates and does not count.
    fn validate_embedding(&self) -> MetadataResult<()> {
        let mut marks: HashMap<ClassId, Mark> = HashMap::new();
        for entry in self.sorted_staged() {
            let mut path = Vec::new();
            self.visit(&entry.id, &mut marks, &mut path)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        id: &ClassId,
        marks: &mut HashMap<ClassId, Mark>,
        path: &mut Vec<ClassId>,
    ) -> MetadataResult<()> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Active) => {
                let start = path.iter().position(|c| c == id).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(id.clone());
                return Err(MetadataError::CyclicEmbedding { path: cycle });
            }
            None => {}
        }
        let Some(entry) = self.lookup(id) else {
            return Ok(());
        };
        marks.insert(id.clone(), Mark::Active);
        path.push(id.clone());
        for field in &entry.fields {
            let mut edges = Edges::default();
            edges.walk(&field.plan, field.nullable);
            for target in edges.mandatory_embeds {
                for class in self.concrete_classes(target) {
                    self.visit(&class, marks, path)?;
                }
            }
        }
        path.pop();
        marks.insert(id.clone(), Mark::Done);
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Mark {
    Active,
    Done,
}

/// Record edges of one field plan.
#[derive(Default)]
struct Edges<'p> {
    references: Vec<&'p RecordTarget>,
    mandatory_embeds: Vec<&'p RecordTarget>,
}

impl<'p> Edges<'p> {
    fn walk(&mut self, plan: &'p ValuePlan, terminable: bool) {
        match plan {
            ValuePlan::Convert(_) => {}
            ValuePlan::Reference { target } => self.references.push(target),
            ValuePlan::Embed { target, .. } => {
                if !terminable {
                    self.mandatory_embeds.push(target);
                }
            }
            ValuePlan::List(inner) => self.walk(inner, true),
            ValuePlan::Map { value, .. } => self.walk(value, true),
        }
    }
}
