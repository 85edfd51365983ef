//! The record store boundary.
//!
//! The mapper never talks to a database client. It hands
//! [`StorageRecord`]s to a [`RecordStore`], addressed by [`RecordKey`], and
//! the store turns them into its own wire records.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use recmap_types::{StorageRecord, StorageValue};

use crate::error::{StoreError, StoreResult};

/// The user-supplied part of a record address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UserKey {
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl TryFrom<StorageValue> for UserKey {
    type Error = StoreError;

    fn try_from(value: StorageValue) -> StoreResult<Self> {
        match value {
            StorageValue::Int(v) => Ok(Self::Int(v)),
            StorageValue::Text(v) => Ok(Self::Text(v)),
            StorageValue::Bytes(v) => Ok(Self::Bytes(v)),
            other => Err(StoreError::InvalidKey(format!(
                "{} values cannot be record keys",
                other.kind_name()
            ))),
        }
    }
}

impl From<UserKey> for StorageValue {
    fn from(key: UserKey) -> Self {
        match key {
            UserKey::Int(v) => StorageValue::Int(v),
            UserKey::Text(v) => StorageValue::Text(v),
            UserKey::Bytes(v) => StorageValue::Bytes(v),
        }
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Full address of a stored record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub namespace: String,
    pub set: Option<String>,
    pub user_key: UserKey,
}

impl RecordKey {
    pub fn new(namespace: impl Into<String>, set: Option<String>, user_key: UserKey) -> Self {
        Self {
            namespace: namespace.into(),
            set,
            user_key,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.namespace,
            self.set.as_deref().unwrap_or(""),
            self.user_key
        )
    }
}

/// Per-write options derived from a class's metadata.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WritePolicy {
    /// Record time-to-live in seconds; 0 means the store default.
    pub expiration: u32,
    pub durable_delete: bool,
    /// Store the user key alongside the record.
    pub send_key: bool,
}

/// Keyed record store.
///
/// Implementations must be safe for concurrent use. A `put` replaces any
/// record already stored under the same key.
pub trait RecordStore: Send + Sync {
    /// Write a record.
    fn put(&self, key: &RecordKey, record: &StorageRecord, policy: &WritePolicy) -> StoreResult<()>;

    /// Read a record. Returns `Ok(None)` if nothing is stored under `key`.
    fn get(&self, key: &RecordKey) -> StoreResult<Option<StorageRecord>>;

    /// Delete a record. Returns `true` if it existed.
    fn delete(&self, key: &RecordKey, policy: &WritePolicy) -> StoreResult<bool>;

    fn exists(&self, key: &RecordKey) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

#[derive(Clone, Debug)]
struct StoredRecord {
    record: StorageRecord,
    policy: WritePolicy,
}

/// In-memory, HashMap-based record store.
///
/// Intended for tests and embedding. Records are cloned on read and write.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<RecordKey, StoredRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// The policy the record under `key` was last written with.
    pub fn policy(&self, key: &RecordKey) -> Option<WritePolicy> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.get(key).map(|stored| stored.policy)
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<RecordKey> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<RecordKey> = records.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl RecordStore for InMemoryRecordStore {
    fn put(&self, key: &RecordKey, record: &StorageRecord, policy: &WritePolicy) -> StoreResult<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(
            key.clone(),
            StoredRecord {
                record: record.clone(),
                policy: *policy,
            },
        );
        Ok(())
    }

    fn get(&self, key: &RecordKey) -> StoreResult<Option<StorageRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(key).map(|stored| stored.record.clone()))
    }

    fn delete(&self, key: &RecordKey, _policy: &WritePolicy) -> StoreResult<bool> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        Ok(records.remove(key).is_some())
    }

    fn exists(&self, key: &RecordKey) -> StoreResult<bool> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.contains_key(key))
    }
}

impl fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &self.len())
            .finish()
    }
}
