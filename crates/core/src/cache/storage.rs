//! Byte storage for generated ticket files.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Directory (relative to the storage root) holding cached ticket files.
const CACHE_DIR: &str = "cachedfiles";

/// Errors from the file storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Stored file not found: {key}")]
    NotFound { key: String },

    #[error("Invalid storage key: {key}")]
    InvalidKey { key: String },

    #[error("Checksum mismatch for {key}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A byte store where each saved file gets its own key.
///
/// Keys are never reused, so two cache entries never share stored bytes.
pub trait FileStorage: Send + Sync {
    /// Store `data` and return the key of the new slot. `name` only
    /// contributes its extension to the key.
    fn save(&self, name: &str, data: &[u8]) -> Result<String, StorageError>;

    /// Read the bytes stored under `key`.
    fn open(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Delete the bytes stored under `key`. Missing keys are not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Whether `key` currently holds bytes.
    fn exists(&self, key: &str) -> bool;
}

/// Generate a fresh storage key keeping the extension of `name`.
pub(crate) fn new_key(name: &str) -> String {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}/{}{}", CACHE_DIR, uuid::Uuid::new_v4().simple(), extension)
}

/// File storage on the local file system.
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Creates a storage rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(root.join(CACHE_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl FileStorage for LocalFileStorage {
    fn save(&self, name: &str, data: &[u8]) -> Result<String, StorageError> {
        let key = new_key(name);
        let path = self.path_for(&key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a temp file first so readers never see a partial file.
        let temp_path = path.with_extension("partial");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, &path)?;

        tracing::trace!(key = %key, size = data.len(), "Stored file");
        Ok(key)
    }

    fn open(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    key: key.to_string(),
                }
            } else {
                StorageError::Io(e)
            }
        })
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key).map(|p| p.is_file()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_open_delete() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::new(dir.path()).unwrap();

        let key = storage.save("ticket.pdf", b"%PDF-1.4").unwrap();
        assert!(key.starts_with("cachedfiles/"));
        assert!(key.ends_with(".pdf"));
        assert!(storage.exists(&key));
        assert_eq!(storage.open(&key).unwrap(), b"%PDF-1.4");

        storage.delete(&key).unwrap();
        assert!(!storage.exists(&key));
        assert!(matches!(
            storage.open(&key),
            Err(StorageError::NotFound { .. })
        ));
        // Deleting twice is fine.
        storage.delete(&key).unwrap();
    }

    #[test]
    fn test_each_save_gets_its_own_slot() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::new(dir.path()).unwrap();

        let a = storage.save("ticket.pdf", b"a").unwrap();
        let b = storage.save("ticket.pdf", b"b").unwrap();
        assert_ne!(a, b);
        assert_eq!(storage.open(&a).unwrap(), b"a");
        assert_eq!(storage.open(&b).unwrap(), b"b");
    }

    #[test]
    fn test_rejects_keys_escaping_root() {
        let dir = TempDir::new().unwrap();
        let storage = LocalFileStorage::new(dir.path()).unwrap();

        for key in ["../etc/passwd", "/etc/passwd", "", "cachedfiles/../../x"] {
            assert!(matches!(
                storage.open(key),
                Err(StorageError::InvalidKey { .. })
            ));
            assert!(!storage.exists(key));
        }
    }

    #[test]
    fn test_new_key_extension_handling() {
        assert!(new_key("ticket.PDF").ends_with(".pdf"));
        assert!(!new_key("ticket").contains('.'));
        assert!(!new_key("weird.p/df").ends_with(".p/df"));
    }
}
