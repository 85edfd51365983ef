use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::entity::{downcast, Entity};
use crate::error::{ValueError, ValueResult};

/// In-memory domain value.
///
/// Entities expose their declared fields as `Value`s and accept them back
/// during hydration. Collections are element-wise; sets travel as
/// [`Value::List`]. Nested records travel as [`Value::Object`].
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Uuid(Uuid),
    /// Enumeration variant by name.
    Enum(String),
    List(Vec<Value>),
    /// Key/value pairs in iteration order.
    Map(Vec<(Value, Value)>),
    Object(Box<dyn Entity>),
    /// Opaque value handled by a user converter.
    Custom(CustomValue),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::Uuid(_) => "uuid",
            Self::Enum(_) => "enum",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Custom(_) => "custom",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Wrap a user type for a converter.
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Self::Custom(CustomValue::new(value))
    }

    /// Borrow a user type previously wrapped with [`Value::custom`].
    pub fn custom_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Custom(custom) => custom.downcast_ref(),
            _ => None,
        }
    }

    /// Take a user type out of a [`Value::Custom`].
    pub fn into_custom<T: Any + Send + Sync + Clone>(self) -> ValueResult<T> {
        match self {
            Self::Custom(custom) => custom.take(),
            other => Err(ValueError::mismatch("custom", &other)),
        }
    }

    /// Take a concrete entity out of a [`Value::Object`].
    pub fn into_entity<T: Entity>(self) -> ValueResult<T> {
        match self {
            Self::Object(entity) => downcast(entity),
            other => Err(ValueError::mismatch("object", &other)),
        }
    }
}

/// Type-erased user value carried by [`Value::Custom`].
#[derive(Clone)]
pub struct CustomValue {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl CustomValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Rust type name of the wrapped value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Unwrap the value, cloning only if it is still shared.
    pub fn take<T: Any + Send + Sync + Clone>(self) -> ValueResult<T> {
        let type_name = self.type_name;
        match Arc::downcast::<T>(self.inner) {
            Ok(arc) => Ok(Arc::try_unwrap(arc).unwrap_or_else(|shared| (*shared).clone())),
            Err(_) => Err(ValueError::ClassMismatch {
                expected: std::any::type_name::<T>().to_string(),
                found: type_name.to_string(),
            }),
        }
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Custom({})", self.type_name)
    }
}

/// Byte-string field type; keeps `Vec<u8>` free for ordinary lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bytes(pub Vec<u8>);

impl From<Vec<u8>> for Bytes {
    fn from(data: Vec<u8>) -> Self {
        Self(data)
    }
}

/// Read a Rust field as a [`Value`].
pub trait IntoValue {
    fn to_value(&self) -> Value;
}

/// Write a [`Value`] back into a Rust field.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> ValueResult<Self>;
}

impl IntoValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> ValueResult<Self> {
        Ok(value)
    }
}

impl IntoValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> ValueResult<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(ValueError::mismatch("bool", &other)),
        }
    }
}

impl IntoValue for i64 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> ValueResult<Self> {
        match value {
            Value::Int(v) => Ok(v),
            other => Err(ValueError::mismatch("int", &other)),
        }
    }
}

macro_rules! narrow_int {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> ValueResult<Self> {
                    let wide = i64::from_value(value)?;
                    <$ty>::try_from(wide).map_err(|_| ValueError::OutOfRange {
                        value: wide,
                        target: stringify!($ty),
                    })
                }
            }
        )*
    };
}

narrow_int!(i8, i16, i32, u8, u16, u32);

impl IntoValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> ValueResult<Self> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(ValueError::mismatch("float", &other)),
        }
    }
}

impl IntoValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> ValueResult<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl IntoValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> ValueResult<Self> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(ValueError::mismatch("text", &other)),
        }
    }
}

impl IntoValue for Bytes {
    fn to_value(&self) -> Value {
        Value::Bytes(self.0.clone())
    }
}

impl FromValue for Bytes {
    fn from_value(value: Value) -> ValueResult<Self> {
        match value {
            Value::Bytes(v) => Ok(Self(v)),
            other => Err(ValueError::mismatch("bytes", &other)),
        }
    }
}

impl IntoValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> ValueResult<Self> {
        match value {
            Value::Timestamp(v) => Ok(v),
            other => Err(ValueError::mismatch("timestamp", &other)),
        }
    }
}

impl IntoValue for NaiveDate {
    fn to_value(&self) -> Value {
        Value::Date(*self)
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> ValueResult<Self> {
        match value {
            Value::Date(v) => Ok(v),
            other => Err(ValueError::mismatch("date", &other)),
        }
    }
}

impl IntoValue for Uuid {
    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> ValueResult<Self> {
        match value {
            Value::Uuid(v) => Ok(v),
            other => Err(ValueError::mismatch("uuid", &other)),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, IntoValue::to_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> ValueResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl IntoValue for Box<dyn Entity> {
    fn to_value(&self) -> Value {
        Value::Object(self.clone_entity())
    }
}

impl FromValue for Box<dyn Entity> {
    fn from_value(value: Value) -> ValueResult<Self> {
        match value {
            Value::Object(entity) => Ok(entity),
            other => Err(ValueError::mismatch("object", &other)),
        }
    }
}

fn list_items(value: Value) -> ValueResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(ValueError::mismatch("list", &other)),
    }
}

fn map_entries(value: Value) -> ValueResult<Vec<(Value, Value)>> {
    match value {
        Value::Map(entries) => Ok(entries),
        other => Err(ValueError::mismatch("map", &other)),
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(IntoValue::to_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> ValueResult<Self> {
        list_items(value)?.into_iter().map(T::from_value).collect()
    }
}

impl<T: IntoValue> IntoValue for BTreeSet<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(IntoValue::to_value).collect())
    }
}

impl<T: FromValue + Ord> FromValue for BTreeSet<T> {
    fn from_value(value: Value) -> ValueResult<Self> {
        list_items(value)?.into_iter().map(T::from_value).collect()
    }
}

impl<T: IntoValue> IntoValue for HashSet<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(IntoValue::to_value).collect())
    }
}

impl<T: FromValue + Eq + Hash> FromValue for HashSet<T> {
    fn from_value(value: Value) -> ValueResult<Self> {
        list_items(value)?.into_iter().map(T::from_value).collect()
    }
}

impl<K: IntoValue, V: IntoValue> IntoValue for BTreeMap<K, V> {
    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }
}

impl<K: FromValue + Ord, V: FromValue> FromValue for BTreeMap<K, V> {
    fn from_value(value: Value) -> ValueResult<Self> {
        map_entries(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }
}

impl<K: IntoValue, V: IntoValue> IntoValue for HashMap<K, V> {
    fn to_value(&self) -> Value {
        Value::Map(self.iter().map(|(k, v)| (k.to_value(), v.to_value())).collect())
    }
}

impl<K: FromValue + Eq + Hash, V: FromValue> FromValue for HashMap<K, V> {
    fn from_value(value: Value) -> ValueResult<Self> {
        map_entries(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }
}
