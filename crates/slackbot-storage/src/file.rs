//! File storage backend.
//!
//! Layout: `<root>/<collection>/<key>.json`. Writes go to a temporary sibling
//! file first and are renamed into place.

use crate::StorageBackend;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const FILE_EXTENSION: &str = "json";

/// One file per key below a root directory.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    // Serializes write/rename/delete sequences within this process.
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Create the backend, creating the root directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create storage directory {}", root.display()))?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    fn entry_path(&self, collection: &str, key: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.{}", key, FILE_EXTENSION))
    }
}

impl StorageBackend for FileBackend {
    fn write_raw(&self, collection: &str, key: &str, data: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock();
        let dir = self.collection_dir(collection);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create collection {}", dir.display()))?;

        let path = self.entry_path(collection, key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, data)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to move {} into place", path.display()))?;
        Ok(())
    }

    fn read_raw(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(collection, key);
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn list_keys(&self, collection: &str) -> Result<Vec<String>> {
        let dir = self.collection_dir(collection);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", dir.display()));
            }
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                debug!("Skipping non-entry file {}", path.display());
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let path = self.entry_path(collection, key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }
}
