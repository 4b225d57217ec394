//! In-memory file storage for testing.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cache::{new_key, FileStorage, StorageError};

/// File storage keeping bytes in a map.
#[derive(Debug, Default)]
pub struct MemoryFileStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Keys of all stored files, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Overwrite stored bytes without going through the cache.
    pub fn corrupt(&self, key: &str, data: &[u8]) {
        self.lock().insert(key.to_string(), data.to_vec());
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FileStorage for MemoryFileStorage {
    fn save(&self, name: &str, data: &[u8]) -> Result<String, StorageError> {
        let key = new_key(name);
        self.lock().insert(key.clone(), data.to_vec());
        Ok(key)
    }

    fn open(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }
}
