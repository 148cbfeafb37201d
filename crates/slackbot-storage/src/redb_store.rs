//! redb storage backend.
//!
//! All collections share one table. Entries are keyed `"<collection>/<key>"`;
//! validated keys never contain `/`, so a collection is a contiguous prefix
//! range of the table.

use crate::StorageBackend;
use anyhow::Result;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

const TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("collections");

const SEPARATOR: char = '/';

/// Embedded database backend.
#[derive(Debug, Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open (or create) the database file, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let db = Arc::new(Database::create(path)?);
        Self::new(db)
    }

    /// Use an already opened database.
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Get a reference to the underlying database
    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    fn full_key(collection: &str, key: &str) -> String {
        format!("{}{}{}", collection, SEPARATOR, key)
    }

    fn collection_prefix(collection: &str) -> String {
        format!("{}{}", collection, SEPARATOR)
    }

    /// Half-open table range holding exactly the entries of `collection`.
    ///
    /// The end bound swaps the separator for the next character (`'0'`), so
    /// `"queue_archive/..."` never falls inside the range of `"queue"`.
    fn collection_range(collection: &str) -> (String, String) {
        let next = char::from_u32(u32::from(SEPARATOR) + 1).unwrap_or(char::MAX);
        (
            Self::collection_prefix(collection),
            format!("{}{}", collection, next),
        )
    }
}

impl StorageBackend for RedbBackend {
    fn write_raw(&self, collection: &str, key: &str, data: &[u8]) -> Result<()> {
        let full_key = Self::full_key(collection, key);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE)?;
            table.insert(full_key.as_str(), data)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn read_raw(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let full_key = Self::full_key(collection, key);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE)?;

        if let Some(value) = table.get(full_key.as_str())? {
            Ok(Some(value.value().to_vec()))
        } else {
            Ok(None)
        }
    }

    fn list_keys(&self, collection: &str) -> Result<Vec<String>> {
        let (prefix, end) = Self::collection_range(collection);

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE)?;

        let mut keys = Vec::new();
        for entry in table.range(prefix.as_str()..end.as_str())? {
            let (key, _) = entry?;
            if let Some(stripped) = key.value().strip_prefix(&prefix) {
                keys.push(stripped.to_string());
            }
        }

        Ok(keys)
    }

    fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let full_key = Self::full_key(collection, key);
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(TABLE)?;
            table.remove(full_key.as_str())?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    fn delete_collection(&self, collection: &str) -> Result<usize> {
        let prefix = Self::collection_prefix(collection);
        let keys: Vec<String> = self
            .list_keys(collection)?
            .into_iter()
            .map(|key| format!("{}{}", prefix, key))
            .collect();

        let write_txn = self.db.begin_write()?;
        let mut removed = 0;
        {
            let mut table = write_txn.open_table(TABLE)?;
            for key in &keys {
                if table.remove(key.as_str())?.is_some() {
                    removed += 1;
                }
            }
        }
        write_txn.commit()?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Storage, StorageError};
    use tempfile::tempdir;

    fn open_backend(dir: &tempfile::TempDir) -> RedbBackend {
        RedbBackend::open(&dir.path().join("data").join("bot.db")).unwrap()
    }

    #[test]
    fn test_collection_range_bounds() {
        let (start, end) = RedbBackend::collection_range("queue");
        assert_eq!((start.as_str(), end.as_str()), ("queue/", "queue0"));
        assert!("queue/a" >= start.as_str() && "queue/a" < end.as_str());
        assert!("queue_archive/a" > end.as_str());
        assert!("queue" < start.as_str());
    }

    #[test]
    fn test_put_get_delete() {
        let temp_dir = tempdir().unwrap();
        let backend = open_backend(&temp_dir);

        backend.write_raw("queue", "key-1", b"payload").unwrap();
        assert_eq!(
            backend.read_raw("queue", "key-1").unwrap(),
            Some(b"payload".to_vec())
        );

        assert!(backend.delete("queue", "key-1").unwrap());
        assert_eq!(backend.read_raw("queue", "key-1").unwrap(), None);
    }

    #[test]
    fn test_list_keys_only_returns_collection() {
        let temp_dir = tempdir().unwrap();
        let backend = open_backend(&temp_dir);

        backend.write_raw("queue", "b", b"2").unwrap();
        backend.write_raw("queue", "a", b"1").unwrap();
        backend.write_raw("queue_archive", "z", b"3").unwrap();
        backend.write_raw("quer", "y", b"4").unwrap();

        assert_eq!(backend.list_keys("queue").unwrap(), vec!["a", "b"]);
        assert_eq!(backend.list_keys("queue_archive").unwrap(), vec!["z"]);
    }

    #[test]
    fn test_delete_collection_keeps_neighbours() {
        let temp_dir = tempdir().unwrap();
        let backend = open_backend(&temp_dir);

        backend.write_raw("queue", "a", b"1").unwrap();
        backend.write_raw("queue", "b", b"2").unwrap();
        backend.write_raw("other", "a", b"3").unwrap();

        assert_eq!(backend.delete_collection("queue").unwrap(), 2);
        assert!(backend.list_keys("queue").unwrap().is_empty());
        assert_eq!(backend.list_keys("other").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let temp_dir = tempdir().unwrap();
        {
            let storage = Storage::new(open_backend(&temp_dir));
            storage.write("queue", "key-1", &"reply done").unwrap();
        }

        let storage = Storage::new(open_backend(&temp_dir));
        let value: String = storage.read("queue", "key-1").unwrap();
        assert_eq!(value, "reply done");
        assert!(matches!(
            storage.read::<String>("queue", "key-2"),
            Err(StorageError::NotFound { .. })
        ));
    }
}
