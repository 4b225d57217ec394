//! Artifact cache for generated ticket documents.
//!
//! Entries are keyed by (owning entity, output identifier). Each entry owns
//! exactly one stored file; removing the entry removes the file. During
//! regeneration all entries of a key are purged before the new entry is
//! created, and lookups take the newest entry that has a file.

mod sqlite;
mod storage;
mod types;

pub use sqlite::SqliteTicketCache;
pub(crate) use storage::new_key;
pub use storage::{FileStorage, LocalFileStorage, StorageError};
pub use types::{file_extension, CacheOwner, CachedTicket, EntityKind, NewCacheEntry, StoredFile};

use thiserror::Error;

/// Errors from the ticket cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache entry not found: {kind} {id}")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("Cache entry {kind} {id} has no file")]
    NoFile { kind: EntityKind, id: i64 },
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Database(e.to_string())
    }
}

/// Trait for ticket cache backends.
pub trait TicketCache: Send + Sync {
    /// Newest entry for the key that has a file attached.
    fn latest(
        &self,
        owner: CacheOwner,
        provider: &str,
    ) -> Result<Option<CachedTicket>, CacheError>;

    /// Get an entry by ID.
    fn get(&self, kind: EntityKind, id: i64) -> Result<Option<CachedTicket>, CacheError>;

    /// All entries for the key, oldest first, with or without file.
    fn list(&self, owner: CacheOwner, provider: &str) -> Result<Vec<CachedTicket>, CacheError>;

    /// Create an entry without a file.
    fn create(&self, entry: NewCacheEntry) -> Result<CachedTicket, CacheError>;

    /// Store `data` in a new slot owned by the entry.
    ///
    /// A file the entry held before is deleted.
    fn attach_file(
        &self,
        kind: EntityKind,
        id: i64,
        filename: &str,
        data: &[u8],
    ) -> Result<CachedTicket, CacheError>;

    /// Read and verify the bytes of an entry.
    fn read(&self, entry: &CachedTicket) -> Result<Vec<u8>, CacheError>;

    /// Delete an entry and its file. Returns false if it did not exist.
    fn delete(&self, kind: EntityKind, id: i64) -> Result<bool, CacheError>;

    /// Delete all entries (and files) for the key. Returns how many were removed.
    fn purge(&self, owner: CacheOwner, provider: &str) -> Result<usize, CacheError>;

    /// Delete all entries (and files) of an entity, for every output.
    fn invalidate(&self, owner: CacheOwner) -> Result<usize, CacheError>;
}
