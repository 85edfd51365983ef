//! Built-in converters for scalar, temporal, uuid and enum types.
//!
//! | Tag         | Storage form                     |
//! |-------------|----------------------------------|
//! | `bool`      | `Bool`                           |
//! | `int`       | `Int`                            |
//! | `float`     | `Float`                          |
//! | `text`      | `Text`                           |
//! | `bytes`     | `Bytes`                          |
//! | `timestamp` | `Int`, milliseconds since epoch  |
//! | `date`      | `Text`, `YYYY-MM-DD`             |
//! | `uuid`      | `Text`, hyphenated               |
//! | `enum`      | `Text`, variant name             |

use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use recmap_types::{StorageValue, TypeTag, Value};
use uuid::Uuid;

use crate::converter::Converter;
use crate::error::{ConvertError, ConvertResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn unexpected_value(expected: &'static str, found: &Value) -> ConvertError {
    ConvertError::UnexpectedValue {
        expected,
        found: found.kind_name(),
    }
}

fn unexpected_storage(expected: &'static str, found: &StorageValue) -> ConvertError {
    ConvertError::UnexpectedStorage {
        expected,
        found: found.kind_name(),
    }
}

/// `bool` ⇄ `Bool`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoolConverter;

impl Converter for BoolConverter {
    fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue> {
        match value {
            Value::Bool(v) => Ok(StorageValue::Bool(*v)),
            other => Err(unexpected_value("bool", other)),
        }
    }

    fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value> {
        match value {
            StorageValue::Bool(v) => Ok(Value::Bool(*v)),
            other => Err(unexpected_storage("bool", other)),
        }
    }
}

/// `int` ⇄ `Int`.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntConverter;

impl Converter for IntConverter {
    fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue> {
        match value {
            Value::Int(v) => Ok(StorageValue::Int(*v)),
            other => Err(unexpected_value("int", other)),
        }
    }

    fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value> {
        match value {
            StorageValue::Int(v) => Ok(Value::Int(*v)),
            other => Err(unexpected_storage("int", other)),
        }
    }
}

/// `float` ⇄ `Float`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FloatConverter;

impl Converter for FloatConverter {
    fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue> {
        match value {
            Value::Float(v) => Ok(StorageValue::Float(*v)),
            other => Err(unexpected_value("float", other)),
        }
    }

    fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value> {
        match value {
            StorageValue::Float(v) => Ok(Value::Float(*v)),
            other => Err(unexpected_storage("float", other)),
        }
    }
}

/// `text` ⇄ `Text`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextConverter;

impl Converter for TextConverter {
    fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue> {
        match value {
            Value::Text(v) => Ok(StorageValue::Text(v.clone())),
            other => Err(unexpected_value("text", other)),
        }
    }

    fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value> {
        match value {
            StorageValue::Text(v) => Ok(Value::Text(v.clone())),
            other => Err(unexpected_storage("text", other)),
        }
    }
}

/// `bytes` ⇄ `Bytes`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesConverter;

impl Converter for BytesConverter {
    fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue> {
        match value {
            Value::Bytes(v) => Ok(StorageValue::Bytes(v.clone())),
            other => Err(unexpected_value("bytes", other)),
        }
    }

    fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value> {
        match value {
            StorageValue::Bytes(v) => Ok(Value::Bytes(v.clone())),
            other => Err(unexpected_storage("bytes", other)),
        }
    }
}

/// `timestamp` ⇄ `Int` milliseconds since the UNIX epoch.
///
/// Sub-millisecond precision is truncated on the way to storage.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimestampConverter;

impl Converter for TimestampConverter {
    fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue> {
        match value {
            Value::Timestamp(v) => Ok(StorageValue::Int(v.timestamp_millis())),
            other => Err(unexpected_value("timestamp", other)),
        }
    }

    fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value> {
        match value {
            StorageValue::Int(ms) => DateTime::from_timestamp_millis(*ms)
                .map(Value::Timestamp)
                .ok_or_else(|| ConvertError::Invalid {
                    tag: TypeTag::TIMESTAMP,
                    reason: format!("{ms} ms is out of range"),
                }),
            other => Err(unexpected_storage("int", other)),
        }
    }
}

/// `date` ⇄ ISO-8601 `Text`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DateConverter;

impl Converter for DateConverter {
    fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue> {
        match value {
            Value::Date(v) => Ok(StorageValue::Text(v.format(DATE_FORMAT).to_string())),
            other => Err(unexpected_value("date", other)),
        }
    }

    fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value> {
        match value {
            StorageValue::Text(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| ConvertError::Invalid {
                    tag: TypeTag::DATE,
                    reason: format!("{s:?}: {e}"),
                }),
            other => Err(unexpected_storage("text", other)),
        }
    }
}

/// `uuid` ⇄ hyphenated `Text`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidConverter;

impl Converter for UuidConverter {
    fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue> {
        match value {
            Value::Uuid(v) => Ok(StorageValue::Text(v.to_string())),
            other => Err(unexpected_value("uuid", other)),
        }
    }

    fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value> {
        match value {
            StorageValue::Text(s) => Uuid::parse_str(s)
                .map(Value::Uuid)
                .map_err(|e| ConvertError::Invalid {
                    tag: TypeTag::UUID,
                    reason: format!("{s:?}: {e}"),
                }),
            other => Err(unexpected_storage("text", other)),
        }
    }
}

/// `enum` ⇄ variant name as `Text`.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnumConverter;

impl Converter for EnumConverter {
    fn to_storage(&self, value: &Value) -> ConvertResult<StorageValue> {
        match value {
            Value::Enum(name) => Ok(StorageValue::Text(name.clone())),
            other => Err(unexpected_value("enum", other)),
        }
    }

    fn from_storage(&self, value: &StorageValue) -> ConvertResult<Value> {
        match value {
            StorageValue::Text(name) => Ok(Value::Enum(name.clone())),
            other => Err(unexpected_storage("text", other)),
        }
    }
}

/// Every built-in converter with its tag.
pub fn all() -> Vec<(TypeTag, Arc<dyn Converter>)> {
    vec![
        (TypeTag::BOOL, Arc::new(BoolConverter)),
        (TypeTag::INT, Arc::new(IntConverter)),
        (TypeTag::FLOAT, Arc::new(FloatConverter)),
        (TypeTag::TEXT, Arc::new(TextConverter)),
        (TypeTag::BYTES, Arc::new(BytesConverter)),
        (TypeTag::TIMESTAMP, Arc::new(TimestampConverter)),
        (TypeTag::DATE, Arc::new(DateConverter)),
        (TypeTag::UUID, Arc::new(UuidConverter)),
        (TypeTag::ENUM, Arc::new(EnumConverter)),
    ]
}
