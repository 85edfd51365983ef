use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use recmap_types::TypeTag;
use tracing::debug;

use crate::builtin;
use crate::converter::{Converter, Typed, TypedConverter};
use crate::error::{RegistryError, RegistryResult};

/// Where a registered converter came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConverterOrigin {
    Builtin,
    User,
}

/// A registered converter and its semantic type.
///
/// Immutable once registered; cloning shares the converter.
#[derive(Clone)]
pub struct ConverterEntry {
    pub tag: TypeTag,
    pub origin: ConverterOrigin,
    pub converter: Arc<dyn Converter>,
}

impl ConverterEntry {
    pub fn is_user_defined(&self) -> bool {
        self.origin == ConverterOrigin::User
    }
}

impl fmt::Debug for ConverterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterEntry")
            .field("tag", &self.tag)
            .field("origin", &self.origin)
            .finish()
    }
}

#[derive(Default)]
struct UserConverters {
    converters: HashMap<TypeTag, Arc<dyn Converter>>,
    sealed: bool,
}

/// Semantic type tag → converter table.
///
/// Built-in converters are fixed at construction. User converters are
/// appended behind a single write lock, and the same lock guards the sealed
/// flag so that registration and sealing are linearized.
pub struct ConverterRegistry {
    builtins: HashMap<TypeTag, Arc<dyn Converter>>,
    user: RwLock<UserConverters>,
}

impl ConverterRegistry {
    /// Create a registry holding only the built-in converters.
    pub fn new() -> Self {
        Self {
            builtins: builtin::all().into_iter().collect(),
            user: RwLock::new(UserConverters::default()),
        }
    }

    /// Register a user converter for `tag`.
    ///
    /// Fails with [`RegistryError::DuplicateConverter`] if a user converter
    /// for the same tag exists; the registry is left unchanged. Shadowing a
    /// built-in tag is allowed.
    pub fn register(
        &self,
        tag: impl Into<TypeTag>,
        converter: impl Converter + 'static,
    ) -> RegistryResult<()> {
        self.register_arc(tag.into(), Arc::new(converter))
    }

    /// Register a [`TypedConverter`].
    pub fn register_typed<C: TypedConverter>(
        &self,
        tag: impl Into<TypeTag>,
        converter: C,
    ) -> RegistryResult<()> {
        self.register(tag, Typed(converter))
    }

    /// Register an already shared converter.
    pub fn register_arc(&self, tag: TypeTag, converter: Arc<dyn Converter>) -> RegistryResult<()> {
        let mut user = self.user.write().unwrap_or_else(PoisonError::into_inner);
        if user.sealed {
            return Err(RegistryError::Sealed { tag });
        }
        if user.converters.contains_key(&tag) {
            return Err(RegistryError::DuplicateConverter { tag });
        }
        debug!(
            tag = %tag,
            shadows_builtin = self.builtins.contains_key(&tag),
            "registered converter"
        );
        user.converters.insert(tag, converter);
        Ok(())
    }

    /// Look up the effective converter for `tag`: user first, then built-in.
    pub fn lookup(&self, tag: &TypeTag) -> Option<ConverterEntry> {
        self.lookup_user(tag).or_else(|| self.builtin(tag))
    }

    /// Look up a user converter only.
    pub fn lookup_user(&self, tag: &TypeTag) -> Option<ConverterEntry> {
        let user = self.user.read().unwrap_or_else(PoisonError::into_inner);
        user.converters.get(tag).map(|converter| ConverterEntry {
            tag: tag.clone(),
            origin: ConverterOrigin::User,
            converter: Arc::clone(converter),
        })
    }

    /// Look up a built-in converter only, ignoring any shadowing.
    pub fn builtin(&self, tag: &TypeTag) -> Option<ConverterEntry> {
        self.builtins.get(tag).map(|converter| ConverterEntry {
            tag: tag.clone(),
            origin: ConverterOrigin::Builtin,
            converter: Arc::clone(converter),
        })
    }

    /// Reject all further registrations. Idempotent.
    pub fn seal(&self) {
        let mut user = self.user.write().unwrap_or_else(PoisonError::into_inner);
        if !user.sealed {
            debug!(user_converters = user.converters.len(), "converter registry sealed");
            user.sealed = true;
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.user.read().unwrap_or_else(PoisonError::into_inner).sealed
    }

    /// Tags of all user converters, sorted.
    pub fn user_tags(&self) -> Vec<TypeTag> {
        let user = self.user.read().unwrap_or_else(PoisonError::into_inner);
        let mut tags: Vec<TypeTag> = user.converters.keys().cloned().collect();
        tags.sort();
        tags
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("builtins", &self.builtins.len())
            .field("user_tags", &self.user_tags())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertResult;
    use recmap_types::{StorageValue, Value};

    /// Stores ints as decimal text.
    struct IntAsText;

    impl Converter for IntAsText {
        fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue> {
            match value {
                Value::Int(v) => Ok(StorageValue::Text(v.to_string())),
                _ => Ok(StorageValue::Null),
            }
        }

        fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value> {
            Ok(value
                .as_str()
                .and_then(|s| s.parse().ok())
                .map_or(Value::Null, Value::Int))
        }
    }

    /// Stores ints negated, to tell two converters apart.
    struct Negate;

    impl Converter for Negate {
        fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue> {
            match value {
                Value::Int(v) => Ok(StorageValue::Int(-v)),
                _ => Ok(StorageValue::Null),
            }
        }

        fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value> {
            Ok(value.as_int().map_or(Value::Null, |v| Value::Int(-v)))
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    #[test]
    fn builtins_are_preregistered() {
        let registry = ConverterRegistry::new();
        let entry = registry.lookup(&TypeTag::INT).expect("int builtin");
        assert_eq!(entry.origin, ConverterOrigin::Builtin);
        assert!(registry.lookup(&TypeTag::new("money")).is_none());
    }

    #[test]
    fn lookup_is_side_effect_free() {
        let registry = ConverterRegistry::new();
        registry.lookup(&TypeTag::new("money"));
        assert!(registry.user_tags().is_empty());
        assert!(!registry.is_sealed());
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    #[test]
    fn user_converter_registers() {
        let registry = ConverterRegistry::new();
        registry.register("money", IntAsText).unwrap();
        let entry = registry.lookup(&TypeTag::new("money")).unwrap();
        assert!(entry.is_user_defined());
        assert_eq!(
            entry.converter.to_storage(&Value::Int(5)).unwrap(),
            StorageValue::Text("5".into())
        );
    }

    #[test]
    fn user_converter_shadows_builtin() {
        let registry = ConverterRegistry::new();
        registry.register(TypeTag::INT, IntAsText).unwrap();
        let entry = registry.lookup(&TypeTag::INT).unwrap();
        assert_eq!(entry.origin, ConverterOrigin::User);
        // The built-in is still reachable directly.
        assert_eq!(
            registry.builtin(&TypeTag::INT).unwrap().origin,
            ConverterOrigin::Builtin
        );
    }

    #[test]
    fn duplicate_registration_fails_and_keeps_first() {
        let registry = ConverterRegistry::new();
        registry.register("score", IntAsText).unwrap();
        let err = registry.register("score", Negate).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateConverter {
                tag: TypeTag::new("score")
            }
        );
        let entry = registry.lookup(&TypeTag::new("score")).unwrap();
        assert_eq!(
            entry.converter.to_storage(&Value::Int(3)).unwrap(),
            StorageValue::Text("3".into())
        );
        assert_eq!(registry.user_tags(), vec![TypeTag::new("score")]);
    }

    #[test]
    fn sealed_registry_rejects_writes() {
        let registry = ConverterRegistry::new();
        registry.register("a", IntAsText).unwrap();
        registry.seal();
        registry.seal();
        assert!(registry.is_sealed());
        let err = registry.register("b", Negate).unwrap_err();
        assert_eq!(err, RegistryError::Sealed { tag: TypeTag::new("b") });
        assert!(registry.lookup(&TypeTag::new("a")).is_some());
    }

    #[test]
    fn concurrent_registration_of_one_tag_admits_one_winner() {
        use std::thread;

        let registry = Arc::new(ConverterRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.register("contended", Negate).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn debug_lists_user_tags() {
        let registry = ConverterRegistry::new();
        registry.register("money", IntAsText).unwrap();
        let debug = format!("{registry:?}");
        assert!(debug.contains("ConverterRegistry"));
        assert!(debug.contains("money"));
    }
}
