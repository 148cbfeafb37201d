//! Slackbot Storage - Collection/key persistence layer
//!
//! This crate provides the persistence capability used by the bot core. Values
//! are grouped into named collections and addressed by string keys. The core
//! only ever sees the narrow [`Storage`] facade:
//!
//! - `write(collection, key, value)`
//! - `read(collection, key) -> value` (error when missing or malformed)
//! - `list_keys(collection) -> [key]` (sorted)
//! - `delete(collection, key)`
//!
//! # Backends
//!
//! - [`MemoryBackend`] - process-local, lost on restart (tests, dry runs)
//! - [`FileBackend`] - one JSON file per key below a root directory
//! - [`RedbBackend`] - embedded redb database (default)
//!
//! Keys and collection names are validated before any backend is touched, so
//! path-traversal-looking input never reaches the file system.

pub mod file;
pub mod memory;
pub mod paths;
pub mod redb_store;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use redb_store::RedbBackend;

/// Errors returned by the [`Storage`] facade.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("No entry '{key}' in collection '{collection}'")]
    NotFound { collection: String, key: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Byte-level storage backend.
///
/// Implementations are responsible for their own internal locking; callers
/// never assume atomicity across multiple calls.
pub trait StorageBackend: Send + Sync {
    /// Store raw bytes, replacing any previous value.
    fn write_raw(&self, collection: &str, key: &str, data: &[u8]) -> anyhow::Result<()>;

    /// Get raw bytes, `None` when the key is absent.
    fn read_raw(&self, collection: &str, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// List all keys of a collection in ascending order.
    fn list_keys(&self, collection: &str) -> anyhow::Result<Vec<String>>;

    /// Delete by key, returns true if existed.
    fn delete(&self, collection: &str, key: &str) -> anyhow::Result<bool>;

    /// Delete every key of a collection, returns the number of removed entries.
    fn delete_collection(&self, collection: &str) -> anyhow::Result<usize> {
        let mut removed = 0;
        for key in self.list_keys(collection)? {
            if self.delete(collection, &key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Which backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    File(PathBuf),
    Redb(PathBuf),
}

/// Validated, typed access to a [`StorageBackend`].
///
/// Cheap to clone; all clones share the same backend.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn StorageBackend>,
}

impl Storage {
    /// Wrap an existing backend.
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Process-local storage.
    pub fn memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Open the requested backend, creating files and directories as needed.
    pub fn open(kind: &BackendKind) -> Result<Self> {
        let storage = match kind {
            BackendKind::Memory => Self::memory(),
            BackendKind::File(root) => Self::new(FileBackend::new(root)?),
            BackendKind::Redb(path) => Self::new(RedbBackend::open(path)?),
        };
        Ok(storage)
    }

    /// Serialize `value` as JSON and store it.
    pub fn write<T: Serialize + ?Sized>(&self, collection: &str, key: &str, value: &T) -> Result<()> {
        validate_key(collection)?;
        validate_key(key)?;
        let data = serde_json::to_vec(value)?;
        self.backend.write_raw(collection, key, &data)?;
        Ok(())
    }

    /// Read and deserialize a stored value.
    ///
    /// A missing key is reported as [`StorageError::NotFound`], a value of the
    /// wrong shape as [`StorageError::Serialization`].
    pub fn read<T: DeserializeOwned>(&self, collection: &str, key: &str) -> Result<T> {
        validate_key(collection)?;
        validate_key(key)?;
        let data = self
            .backend
            .read_raw(collection, key)?
            .ok_or_else(|| StorageError::NotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            })?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// List all keys of a collection in ascending order.
    pub fn list_keys(&self, collection: &str) -> Result<Vec<String>> {
        validate_key(collection)?;
        Ok(self.backend.list_keys(collection)?)
    }

    /// Delete a key. Deleting a missing key is not an error.
    pub fn delete(&self, collection: &str, key: &str) -> Result<()> {
        validate_key(collection)?;
        validate_key(key)?;
        self.backend.delete(collection, key)?;
        Ok(())
    }

    /// Remove a whole collection, returns the number of removed entries.
    pub fn delete_collection(&self, collection: &str) -> Result<usize> {
        validate_key(collection)?;
        Ok(self.backend.delete_collection(collection)?)
    }
}

/// Reject empty and path-traversal-looking keys.
pub fn validate_key(key: &str) -> Result<()> {
    let reason = if key.is_empty() {
        "key must not be empty"
    } else if key.contains("..") {
        "key must not contain '..'"
    } else if key.contains('/') || key.contains('\\') {
        "key must not contain path separators"
    } else if key.chars().any(char::is_control) {
        "key must not contain control characters"
    } else {
        return Ok(());
    };

    Err(StorageError::InvalidKey {
        key: key.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        text: String,
        count: u32,
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("1355517523000005-U1-C1-").is_ok());
        assert!(validate_key("pending_queue").is_ok());

        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a..b").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a\\b").is_err());
        assert!(validate_key("a\nb").is_err());
    }

    #[test]
    fn test_invalid_key_never_reaches_backend() {
        let storage = Storage::memory();
        let err = storage.write("queue", "../escape", &1).unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));
        assert!(err.to_string().contains("../escape"));

        assert!(storage.list_keys("queue").unwrap().is_empty());
        assert!(storage.list_keys("a/b").is_err());
    }

    #[test]
    fn test_typed_round_trip() {
        let storage = Storage::memory();
        let entry = Entry {
            text: "reply done".to_string(),
            count: 2,
        };
        storage.write("queue", "key-1", &entry).unwrap();

        let loaded: Entry = storage.read("queue", "key-1").unwrap();
        assert_eq!(loaded, entry);
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let storage = Storage::memory();
        let err = storage.read::<Entry>("queue", "missing").unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn test_read_wrong_type_is_serialization_error() {
        let storage = Storage::memory();
        storage.write("queue", "key-1", "just a string").unwrap();

        let err = storage.read::<Entry>("queue", "key-1").unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let storage = Storage::memory();
        assert!(storage.delete("queue", "missing").is_ok());
    }

    #[test]
    fn test_delete_collection() {
        let storage = Storage::memory();
        storage.write("queue", "a", &1).unwrap();
        storage.write("queue", "b", &2).unwrap();
        storage.write("other", "a", &3).unwrap();

        assert_eq!(storage.delete_collection("queue").unwrap(), 2);
        assert!(storage.list_keys("queue").unwrap().is_empty());
        assert_eq!(storage.list_keys("other").unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_open_memory() {
        let storage = Storage::open(&BackendKind::Memory).unwrap();
        storage.write("queue", "a", &1).unwrap();
        assert_eq!(storage.read::<i32>("queue", "a").unwrap(), 1);
    }
}
