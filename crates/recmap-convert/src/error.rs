use recmap_types::TypeTag;
use thiserror::Error;

/// Errors raised by a single converter call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// The domain value handed to `to_storage` has the wrong shape.
    #[error("expected {expected} value, found {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: &'static str,
    },

    /// The storage value handed to `from_storage` has the wrong shape.
    #[error("expected {expected} storage value, found {found}")]
    UnexpectedStorage {
        expected: &'static str,
        found: &'static str,
    },

    /// The value has the right shape but cannot be represented.
    #[error("invalid {tag} value: {reason}")]
    Invalid { tag: TypeTag, reason: String },
}

/// Result alias for converter calls.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Errors from registry writes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A user converter for this tag is already registered.
    #[error("duplicate converter for type tag {tag}")]
    DuplicateConverter { tag: TypeTag },

    /// Class resolution has started; the registry no longer accepts writes.
    #[error("converter registry is sealed; cannot register {tag}")]
    Sealed { tag: TypeTag },
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
