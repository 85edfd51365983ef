use std::any::Any;

use recmap_types::{StorageValue, Value};

use crate::error::{ConvertError, ConvertResult};

/// Bidirectional converter for one semantic type.
///
/// Implementations must be pure: the same input always yields the same
/// output, and `from_storage(to_storage(v))` reproduces `v`.
pub trait Converter: Send + Sync {
    fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue>;

    fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value>;
}

/// A converter written against a concrete Rust type.
///
/// Fields using it carry their values as
/// [`Value::Custom`](recmap_types::Value::Custom). Wrap the converter in
/// [`Typed`] to register it.
pub trait TypedConverter: Send + Sync + 'static {
    type Target: Any + Send + Sync + Clone;

    fn to_storage(&self, value: &Self::Target) -> ConvertResult<StorageValue>;

    fn from_storage(&self, value: &StorageValue) -> ConvertResult<Self::Target>;
}

/// Adapter exposing a [`TypedConverter`] as a [`Converter`].
#[derive(Clone, Debug, Default)]
pub struct Typed<C>(pub C);

impl<C: TypedConverter> Converter for Typed<C> {
    fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue> {
        let typed = value
            .custom_ref::<C::Target>()
            .ok_or(ConvertError::UnexpectedValue {
                expected: std::any::type_name::<C::Target>(),
                found: value.kind_name(),
            })?;
        self.0.to_storage(typed)
    }

    fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value> {
        self.0.from_storage(value).map(Value::custom)
    }
}
