use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable identity of a mappable class.
///
/// Concrete Rust types use their full type path ([`ClassId::of`]). Abstract
/// record roots, which have no Rust instances, are named explicitly with
/// [`ClassId::new`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(Arc<str>);

impl ClassId {
    /// Identity from an explicit name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Identity of a concrete Rust type.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(std::any::type_name::<T>())
    }

    /// The full name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment with generic arguments stripped.
    ///
    /// `app::model::Person` → `Person`, `app::Page<app::Item>` → `Page`.
    pub fn simple_name(&self) -> &str {
        let base = self.0.split('<').next().unwrap_or(&self.0);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Semantic type tag: the registry key for converters.
///
/// Tags name the declared type of a field, never the runtime type of a
/// value. Built-in tags are associated constants.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    pub const BOOL: Self = Self::from_static("bool");
    pub const INT: Self = Self::from_static("int");
    pub const FLOAT: Self = Self::from_static("float");
    pub const TEXT: Self = Self::from_static("text");
    pub const BYTES: Self = Self::from_static("bytes");
    pub const TIMESTAMP: Self = Self::from_static("timestamp");
    pub const DATE: Self = Self::from_static("date");
    pub const UUID: Self = Self::from_static("uuid");
    pub const ENUM: Self = Self::from_static("enum");

    /// A tag with a static name.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// A tag with an owned name (user converter tags, config references).
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Person;

    #[test]
    fn class_id_of_type_uses_type_path() {
        let id = ClassId::of::<Person>();
        assert!(id.as_str().ends_with("::Person"));
        assert_eq!(id.simple_name(), "Person");
    }

    #[test]
    fn simple_name_strips_generics() {
        let id = ClassId::new("app::Page<app::model::Item>");
        assert_eq!(id.simple_name(), "Page");
    }

    #[test]
    fn simple_name_of_bare_name() {
        assert_eq!(ClassId::new("BaseInterface").simple_name(), "BaseInterface");
    }

    #[test]
    fn class_id_serializes_as_its_name() {
        let id = ClassId::new("app::model::Person");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""app::model::Person""#);
        let back: ClassId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(back.simple_name(), "Person");
    }

    #[test]
    fn static_and_owned_tags_compare_equal() {
        assert_eq!(TypeTag::TEXT, TypeTag::new("text"));
        assert_ne!(TypeTag::TEXT, TypeTag::INT);
    }

    #[test]
    fn tags_hash_consistently() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(TypeTag::DATE);
        assert!(set.contains(&TypeTag::new("date")));
    }
}
