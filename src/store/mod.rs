//! Primary-store collaborator interface.
//!
//! The primary data store (usually a relational database behind an ORM) is
//! consumed through the [`PrimaryStore`] trait: load records by key, page
//! primary keys for reindexing, and resolve an instance to its indexable
//! primary key. Two implementations ship with the crate: an in-memory fake
//! for tests and embedding, and a directory-backed store for the CLI and
//! local development.

pub mod directory;
pub mod memory;

use serde_json::Value;

use crate::error::Result;

pub use directory::DirectoryPrimaryStore;
pub use memory::MemoryPrimaryStore;

/// A record instance as seen by mutation hooks: the entity type name plus the
/// record's document representation.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInstance {
    /// Entity type name.
    pub entity: String,

    /// Document representation of the record.
    pub document: Value,
}

impl EntityInstance {
    /// Create a new instance value.
    pub fn new<E: Into<String>>(entity: E, document: Value) -> Self {
        EntityInstance {
            entity: entity.into(),
            document,
        }
    }
}

/// One record loaded from the primary store.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// String-encoded primary key.
    pub key: String,

    /// Document representation of the record.
    pub document: Value,
}

/// Access to the primary data store.
pub trait PrimaryStore: Send + Sync + std::fmt::Debug {
    /// Resolve an instance to its string-encoded primary key.
    ///
    /// Returns `None` when the instance cannot be resolved — the entity type
    /// is not indexed or the key value is absent. Callers skip such
    /// instances; this is not an error.
    fn primary_key_of(&self, instance: &EntityInstance) -> Option<String>;

    /// Load the records with the given keys.
    ///
    /// Keys with no backing record are silently absent from the result; the
    /// caller decides what a vanished record means.
    fn load_by_keys(&self, entity: &str, keys: &[String]) -> Result<Vec<SourceRecord>>;

    /// Page through all primary keys of an entity type in a stable order.
    ///
    /// Returns up to `limit` keys starting at `offset`.
    fn page_keys(&self, entity: &str, offset: usize, limit: usize) -> Result<Vec<String>>;
}

/// Encode a JSON key value as a string primary key.
///
/// Strings and numbers are supported; anything else is not a usable key.
pub(crate) fn key_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
