use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of entity a cache entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Combined document for a whole order.
    Order,
    /// Document for a single order position.
    OrderPosition,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Order => "order",
            EntityKind::OrderPosition => "orderposition",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "order" => Some(EntityKind::Order),
            "orderposition" => Some(EntityKind::OrderPosition),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity owning a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CacheOwner {
    Order(i64),
    OrderPosition(i64),
}

impl CacheOwner {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        match kind {
            EntityKind::Order => CacheOwner::Order(id),
            EntityKind::OrderPosition => CacheOwner::OrderPosition(id),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            CacheOwner::Order(_) => EntityKind::Order,
            CacheOwner::OrderPosition(_) => EntityKind::OrderPosition,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            CacheOwner::Order(id) | CacheOwner::OrderPosition(id) => *id,
        }
    }
}

impl fmt::Display for CacheOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// The stored file owned by a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Storage key of the bytes.
    pub key: String,
    /// Filename the output produced.
    pub name: String,
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the bytes.
    pub sha256: String,
}

/// A cached ticket document.
///
/// Position entries correspond to cached tickets, order entries to cached
/// combined tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTicket {
    pub id: i64,
    pub owner: CacheOwner,
    pub provider: String,
    /// File extension including the leading dot (may be empty).
    pub extension: String,
    /// MIME type reported by the output.
    pub content_type: String,
    /// None until the bytes have been attached.
    pub file: Option<StoredFile>,
    pub created_at: DateTime<Utc>,
}

impl CachedTicket {
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }
}

/// Fields of a new cache entry.
#[derive(Debug, Clone)]
pub struct NewCacheEntry {
    pub owner: CacheOwner,
    pub provider: String,
    pub extension: String,
    pub content_type: String,
}

/// Extension of `filename` including the dot, or an empty string.
///
/// Only the final path component is considered, and a leading dot does not
/// start an extension (`.ticket` has none).
pub fn file_extension(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let stem_start = base.len() - base.trim_start_matches('.').len();
    match base[stem_start..].rfind('.') {
        Some(pos) => base[stem_start + pos..].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("ticket.pdf"), ".pdf");
        assert_eq!(file_extension("CONF-ABC12.tar.gz"), ".gz");
        assert_eq!(file_extension("ticket"), "");
        assert_eq!(file_extension(".ticket"), "");
        assert_eq!(file_extension("..ticket.pdf"), ".pdf");
        assert_eq!(file_extension("dir.d/ticket"), "");
        assert_eq!(file_extension("ticket."), ".");
    }

    #[test]
    fn test_cache_owner_parts() {
        let owner = CacheOwner::new(EntityKind::OrderPosition, 7);
        assert_eq!(owner, CacheOwner::OrderPosition(7));
        assert_eq!(owner.kind(), EntityKind::OrderPosition);
        assert_eq!(owner.id(), 7);
        assert_eq!(owner.to_string(), "orderposition:7");
    }

    #[test]
    fn test_entity_kind_names() {
        assert_eq!(EntityKind::parse("order"), Some(EntityKind::Order));
        assert_eq!(
            EntityKind::parse(EntityKind::OrderPosition.as_str()),
            Some(EntityKind::OrderPosition)
        );
        assert_eq!(EntityKind::parse("event"), None);
    }
}
