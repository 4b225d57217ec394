//! SQLite-backed ticket cache implementation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use super::{
    CacheError, CacheOwner, CachedTicket, EntityKind, FileStorage, NewCacheEntry, StorageError,
    StoredFile, TicketCache,
};
use crate::database::Database;

const ENTRY_COLUMNS: &str =
    "id, owner_id, provider, extension, content_type, file_key, file_name, file_size, file_sha256, created_at";

/// Table holding the entries of one entity kind.
fn table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Order => "cached_combined_tickets",
        EntityKind::OrderPosition => "cached_tickets",
    }
}

/// SQLite-backed ticket cache with files in a [`FileStorage`].
pub struct SqliteTicketCache {
    db: Arc<Database>,
    storage: Arc<dyn FileStorage>,
}

impl SqliteTicketCache {
    /// Create the cache on a shared database, creating tables if needed.
    pub fn new(db: Arc<Database>, storage: Arc<dyn FileStorage>) -> Result<Self, CacheError> {
        db.with_connection(Self::initialize_schema)?;
        Ok(Self { db, storage })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CacheError> {
        for kind in [EntityKind::OrderPosition, EntityKind::Order] {
            let name = table(kind);
            conn.execute_batch(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {name} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner_id INTEGER NOT NULL,
                    provider TEXT NOT NULL,
                    extension TEXT NOT NULL,
                    content_type TEXT NOT NULL,
                    file_key TEXT,
                    file_name TEXT,
                    file_size INTEGER,
                    file_sha256 TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_{name}_owner ON {name}(owner_id, provider);
                "#
            ))?;
        }
        Ok(())
    }

    fn row_to_entry(kind: EntityKind, row: &rusqlite::Row) -> rusqlite::Result<CachedTicket> {
        let owner_id: i64 = row.get(1)?;
        let file_key: Option<String> = row.get(5)?;
        let file = match file_key {
            Some(key) => Some(StoredFile {
                key,
                name: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                size_bytes: row.get::<_, Option<i64>>(7)?.unwrap_or(0).max(0) as u64,
                sha256: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            }),
            None => None,
        };
        let created_at_str: String = row.get(9)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    9,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        Ok(CachedTicket {
            id: row.get(0)?,
            owner: CacheOwner::new(kind, owner_id),
            provider: row.get(2)?,
            extension: row.get(3)?,
            content_type: row.get(4)?,
            file,
            created_at,
        })
    }

    fn select_one(
        conn: &Connection,
        kind: EntityKind,
        id: i64,
    ) -> Result<Option<CachedTicket>, CacheError> {
        let sql = format!("SELECT {} FROM {} WHERE id = ?", ENTRY_COLUMNS, table(kind));
        Ok(conn
            .query_row(&sql, params![id], |row| Self::row_to_entry(kind, row))
            .optional()?)
    }

    fn select_where(
        conn: &Connection,
        kind: EntityKind,
        condition: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<CachedTicket>, CacheError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY id",
            ENTRY_COLUMNS,
            table(kind),
            condition
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, |row| Self::row_to_entry(kind, row))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Remove a stored file whose entry is gone. Failures are only logged.
    fn discard_file(&self, file: &StoredFile) {
        if let Err(e) = self.storage.delete(&file.key) {
            tracing::warn!(key = %file.key, error = %e, "Failed to delete cached ticket file");
        }
    }

    fn delete_entries(&self, entries: Vec<CachedTicket>) -> Result<usize, CacheError> {
        let mut removed = 0;
        for entry in entries {
            if self.delete(entry.owner.kind(), entry.id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl TicketCache for SqliteTicketCache {
    fn latest(
        &self,
        owner: CacheOwner,
        provider: &str,
    ) -> Result<Option<CachedTicket>, CacheError> {
        let kind = owner.kind();
        self.db.with_connection(|conn| {
            let sql = format!(
                "SELECT {} FROM {} WHERE owner_id = ? AND provider = ? AND file_key IS NOT NULL ORDER BY id DESC LIMIT 1",
                ENTRY_COLUMNS,
                table(kind)
            );
            Ok(conn
                .query_row(&sql, params![owner.id(), provider], |row| {
                    Self::row_to_entry(kind, row)
                })
                .optional()?)
        })
    }

    fn get(&self, kind: EntityKind, id: i64) -> Result<Option<CachedTicket>, CacheError> {
        self.db.with_connection(|conn| Self::select_one(conn, kind, id))
    }

    fn list(&self, owner: CacheOwner, provider: &str) -> Result<Vec<CachedTicket>, CacheError> {
        self.db.with_connection(|conn| {
            Self::select_where(
                conn,
                owner.kind(),
                "owner_id = ? AND provider = ?",
                &[&owner.id(), &provider],
            )
        })
    }

    fn create(&self, entry: NewCacheEntry) -> Result<CachedTicket, CacheError> {
        let kind = entry.owner.kind();
        let now = Utc::now();
        self.db.with_connection(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (owner_id, provider, extension, content_type, created_at) VALUES (?, ?, ?, ?, ?)",
                    table(kind)
                ),
                params![
                    entry.owner.id(),
                    entry.provider,
                    entry.extension,
                    entry.content_type,
                    now.to_rfc3339(),
                ],
            )?;
            Ok(CachedTicket {
                id: conn.last_insert_rowid(),
                owner: entry.owner,
                provider: entry.provider,
                extension: entry.extension,
                content_type: entry.content_type,
                file: None,
                created_at: now,
            })
        })
    }

    fn attach_file(
        &self,
        kind: EntityKind,
        id: i64,
        filename: &str,
        data: &[u8],
    ) -> Result<CachedTicket, CacheError> {
        let stored = StoredFile {
            key: self.storage.save(filename, data)?,
            name: filename.to_string(),
            size_bytes: data.len() as u64,
            sha256: format!("{:x}", Sha256::digest(data)),
        };

        let result = self.db.with_connection(|conn| {
            let previous = Self::select_one(conn, kind, id)?
                .ok_or(CacheError::NotFound { kind, id })?;
            conn.execute(
                &format!(
                    "UPDATE {} SET file_key = ?, file_name = ?, file_size = ?, file_sha256 = ? WHERE id = ?",
                    table(kind)
                ),
                params![
                    stored.key,
                    stored.name,
                    stored.size_bytes as i64,
                    stored.sha256,
                    id
                ],
            )?;
            Ok::<_, CacheError>(previous)
        });

        match result {
            Ok(previous) => {
                if let Some(old) = &previous.file {
                    self.discard_file(old);
                }
                Ok(CachedTicket {
                    file: Some(stored),
                    ..previous
                })
            }
            Err(e) => {
                self.discard_file(&stored);
                Err(e)
            }
        }
    }

    fn read(&self, entry: &CachedTicket) -> Result<Vec<u8>, CacheError> {
        let file = entry.file.as_ref().ok_or(CacheError::NoFile {
            kind: entry.owner.kind(),
            id: entry.id,
        })?;
        let data = self.storage.open(&file.key)?;
        let actual = format!("{:x}", Sha256::digest(&data));
        if actual != file.sha256 {
            return Err(StorageError::ChecksumMismatch {
                key: file.key.clone(),
                expected: file.sha256.clone(),
                actual,
            }
            .into());
        }
        Ok(data)
    }

    fn delete(&self, kind: EntityKind, id: i64) -> Result<bool, CacheError> {
        let removed = self.db.with_connection(|conn| {
            let Some(entry) = Self::select_one(conn, kind, id)? else {
                return Ok::<_, CacheError>(None);
            };
            conn.execute(
                &format!("DELETE FROM {} WHERE id = ?", table(kind)),
                params![id],
            )?;
            Ok(Some(entry))
        })?;

        match removed {
            Some(entry) => {
                if let Some(file) = &entry.file {
                    self.discard_file(file);
                }
                tracing::debug!(owner = %entry.owner, provider = %entry.provider, entry_id = id, "Deleted cached ticket");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn purge(&self, owner: CacheOwner, provider: &str) -> Result<usize, CacheError> {
        let entries = self.list(owner, provider)?;
        self.delete_entries(entries)
    }

    fn invalidate(&self, owner: CacheOwner) -> Result<usize, CacheError> {
        let entries = self.db.with_connection(|conn| {
            Self::select_where(conn, owner.kind(), "owner_id = ?", &[&owner.id()])
        })?;
        self.delete_entries(entries)
    }
}
