use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::answers::AnswerStore;
use crate::chapters::ChapterStore;
use crate::users::{AuthSessionStore, UserStore};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage keys of the persisted blobs. Each holds one whole JSON value.
pub mod keys {
    pub const USERS: &str = "qcm_users_v1";
    pub const CHAPTERS: &str = "qcm_chapters_v1";
    pub const AUTH: &str = "qcm_auth_v1";
    pub const RESPONSES: &str = "qcm_responses_v1";
    pub const QUESTION_BANK: &str = "qcm_question_bank_v1";
}

/// Durable string-keyed store of whole serialized values.
///
/// No partial updates and no transactions: a `set_raw` replaces the value.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn set_raw(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Delete `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Reads and decodes the JSON value under `key`.
///
/// Missing, unreadable and corrupt values all come back as `T::default()`;
/// the last two are logged.
pub async fn load_json<T>(store: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match store.get_raw(key).await {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::warn!(key, %err, "discarding corrupt stored value");
            T::default()
        }),
        Ok(None) => T::default(),
        Err(err) => {
            tracing::warn!(key, %err, "storage read failed, using empty value");
            T::default()
        }
    }
}

/// Reads the JSON value under `key` for a read-modify-write.
///
/// Unlike [`load_json`], a backend failure is returned so that no write is
/// built on a value that was never read. A missing key reads as
/// `T::default()`. A value that does not decode as `T` is first copied to
/// `{key}_corrupt`, then read as `T::default()`.
///
/// # Errors
///
/// Returns the backend's read error, or its write error when the corrupt
/// value cannot be set aside.
pub async fn try_load_json<T>(store: &dyn KeyValueStore, key: &str) -> Result<T, StorageError>
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = store.get_raw(key).await? else {
        return Ok(T::default());
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(err) => {
            let backup = format!("{key}{CORRUPT_SUFFIX}");
            tracing::warn!(key, %backup, %err, "setting corrupt stored value aside");
            store.set_raw(&backup, raw).await?;
            Ok(T::default())
        }
    }
}

/// Suffix of the key a corrupt value is copied to before it is replaced.
pub const CORRUPT_SUFFIX: &str = "_corrupt";

/// Decodes one entry of a stored collection, logging and skipping it when it
/// does not match `T`.
pub fn decode_entry<T: DeserializeOwned>(key: &str, entry: &Value) -> Option<T> {
    match T::deserialize(entry) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, %err, "skipping unreadable stored entry");
            None
        }
    }
}

/// # Errors
///
/// Returns `StorageError::Serialization` if `value` cannot be encoded.
pub fn encode_entry<T: Serialize>(value: &T) -> Result<Value, StorageError> {
    serde_json::to_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Serializes the read-modify-write cycles of one store.
pub(crate) type WriteLock = Arc<tokio::sync::Mutex<()>>;

/// Encodes `value` as JSON and stores it under `key`.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if encoding fails, or the backend's write error.
pub async fn save_json<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized + Sync,
{
    let raw = serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
    tracing::debug!(key, bytes = raw.len(), "writing stored value");
    store.set_raw(key, raw).await
}

/// Process-local store, for tests and session-scoped values.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set_raw(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// The stores the application needs, all sharing one storage medium.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueStore>,
    pub answers: AnswerStore,
    pub users: UserStore,
    pub auth: AuthSessionStore,
    pub chapters: ChapterStore,
}

impl Storage {
    /// Build every store on top of `kv`.
    #[must_use]
    pub fn from_kv(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            answers: AnswerStore::new(Arc::clone(&kv)),
            users: UserStore::new(Arc::clone(&kv)),
            auth: AuthSessionStore::new(Arc::clone(&kv)),
            chapters: ChapterStore::new(Arc::clone(&kv)),
            kv,
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_kv(Arc::new(InMemoryStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Backend whose reads always fail.
    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get_raw(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Connection("disk on fire".into()))
        }

        async fn set_raw(&self, _key: &str, _value: String) -> Result<(), StorageError> {
            Err(StorageError::Connection("disk on fire".into()))
        }

        async fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn json_round_trips() {
        let store = InMemoryStore::new();
        let mut value = BTreeMap::new();
        value.insert("a".to_string(), 1);
        save_json(&store, "k", &value).await.unwrap();
        let loaded: BTreeMap<String, i32> = load_json(&store, "k").await;
        assert_eq!(loaded, value);
    }

    #[tokio::test]
    async fn corrupt_value_loads_as_default() {
        let store = InMemoryStore::new();
        store.set_raw("k", "{not json".into()).await.unwrap();
        let loaded: Vec<String> = load_json(&store, "k").await;
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn unreadable_backend_loads_as_default() {
        let loaded: Vec<String> = load_json(&BrokenStore, "k").await;
        assert!(loaded.is_empty());
        assert!(save_json(&BrokenStore, "k", &loaded).await.is_err());
    }

    #[tokio::test]
    async fn update_read_fails_when_backend_fails() {
        let loaded: Result<Vec<String>, _> = try_load_json(&BrokenStore, "k").await;
        assert!(matches!(loaded, Err(StorageError::Connection(_))));
    }

    #[tokio::test]
    async fn update_read_sets_corrupt_value_aside() {
        let store = InMemoryStore::new();
        store.set_raw("k", "{not json".into()).await.unwrap();
        let loaded: Vec<String> = try_load_json(&store, "k").await.unwrap();
        assert!(loaded.is_empty());
        assert_eq!(
            store.get_raw("k_corrupt").await.unwrap().as_deref(),
            Some("{not json")
        );
    }

    #[test]
    fn bad_entry_is_skipped() {
        let entries: Vec<Value> = serde_json::from_str(r#"[1, "x", 3]"#).unwrap();
        let decoded: Vec<i32> = entries
            .iter()
            .filter_map(|e| decode_entry("k", e))
            .collect();
        assert_eq!(decoded, [1, 3]);
    }

    #[tokio::test]
    async fn remove_deletes_value() {
        let store = InMemoryStore::new();
        store.set_raw("k", "1".into()).await.unwrap();
        store.remove("k").await.unwrap();
        assert!(store.get_raw("k").await.unwrap().is_none());
    }
}
