//! Key-value persistence contract
//!
//! Platform storage is exposed to the core only through this trait; the
//! core never touches the filesystem or platform preference APIs
//! directly.

use crate::error::StorageError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Raw string-keyed blob store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove(&self, key: &str);
    fn contains(&self, key: &str) -> bool;
}

/// Typed facade over a [`KeyValueStore`] using JSON encoding.
///
/// A blob that fails to decode is treated as absent; recovery from
/// corrupt state is the caller's concern.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<dyn KeyValueStore>,
}

impl Storage {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.inner.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, %err, "discarding undecodable persisted value");
                None
            }
        }
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.inner.put(key, raw)
    }

    pub fn delete(&self, key: &str) {
        self.inner.remove(key);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains(key)
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn put(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }

    fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }
}

/// Single-file JSON store, written whole on every mutation
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store, loading existing content if the file is present.
    /// An unreadable file starts the store empty rather than failing.
    pub fn open(path: PathBuf) -> Self {
        let values = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            path,
            values: RwLock::new(values),
        }
    }

    fn flush(&self, values: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(values).map_err(|source| StorageError::Serialize {
            key: self.path.display().to_string(),
            source,
        })?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn put(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut values = self.values.write();
        values.insert(key.to_string(), value);
        self.flush(&values)
    }

    fn remove(&self, key: &str) {
        let mut values = self.values.write();
        if values.remove(key).is_some() {
            if let Err(err) = self.flush(&values) {
                warn!(key, %err, "failed to persist key removal");
            }
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }
}
