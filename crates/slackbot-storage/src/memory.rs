//! In-memory storage backend.

use crate::StorageBackend;
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Process-local backend. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn write_raw(&self, collection: &str, key: &str, data: &[u8]) -> Result<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn read_raw(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn list_keys(&self, collection: &str) -> Result<Vec<String>> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let mut collections = self.collections.write();
        let Some(entries) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let existed = entries.remove(key).is_some();
        if entries.is_empty() {
            collections.remove(collection);
        }
        Ok(existed)
    }

    fn delete_collection(&self, collection: &str) -> Result<usize> {
        Ok(self
            .collections
            .write()
            .remove(collection)
            .map(|entries| entries.len())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_sorted() {
        let backend = MemoryBackend::new();
        backend.write_raw("queue", "b", b"2").unwrap();
        backend.write_raw("queue", "a", b"1").unwrap();
        backend.write_raw("queue", "c", b"3").unwrap();

        assert_eq!(backend.list_keys("queue").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_collections_are_isolated() {
        let backend = MemoryBackend::new();
        backend.write_raw("one", "key", b"1").unwrap();

        assert_eq!(backend.read_raw("one", "key").unwrap(), Some(b"1".to_vec()));
        assert_eq!(backend.read_raw("two", "key").unwrap(), None);
        assert!(backend.list_keys("two").unwrap().is_empty());
    }

    #[test]
    fn test_delete_reports_existence() {
        let backend = MemoryBackend::new();
        backend.write_raw("queue", "a", b"1").unwrap();

        assert!(backend.delete("queue", "a").unwrap());
        assert!(!backend.delete("queue", "a").unwrap());
        assert!(!backend.delete("missing", "a").unwrap());
    }
}
