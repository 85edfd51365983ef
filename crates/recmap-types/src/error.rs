use thiserror::Error;

use crate::value::Value;

/// Errors produced when moving data between Rust fields and [`Value`]s.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("integer {value} out of range for {target}")]
    OutOfRange { value: i64, target: &'static str },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("unknown variant {variant:?} for enum {enum_name}")]
    UnknownVariant {
        enum_name: &'static str,
        variant: String,
    },

    #[error("expected instance of {expected}, found {found}")]
    ClassMismatch { expected: String, found: String },

    #[error("invalid value: {0}")]
    Invalid(String),
}

impl ValueError {
    /// Build a [`ValueError::TypeMismatch`] for an unexpected value.
    pub fn mismatch(expected: &'static str, found: &Value) -> Self {
        Self::TypeMismatch {
            expected,
            found: found.kind_name(),
        }
    }
}

/// Result alias for value operations.
pub type ValueResult<T> = Result<T, ValueError>;
