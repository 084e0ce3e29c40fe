//! Queue record value types.
//!
//! A [`QueueRecord`] is a pending instruction to add/update or remove one
//! document in a search index. Records are immutable once persisted and are
//! identified by their own id, not by `(entity, key)` — duplicates for the
//! same logical record are legal and collapse in the engine because the final
//! bulk operation is idempotent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of change a queue record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Create or update the document for the record's key.
    Upsert,
    /// Remove the document for the record's key.
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Upsert => write!(f, "upsert"),
            ChangeKind::Delete => write!(f, "delete"),
        }
    }
}

/// A pending change notification for one record of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueRecord {
    /// Unique id of this queue record.
    pub id: Uuid,

    /// Name of the entity type the record belongs to.
    pub entity: String,

    /// String-encoded primary key of the changed record.
    pub key: String,

    /// The change to apply to the index.
    pub kind: ChangeKind,

    /// Enqueue time; drains process records in ascending order of this field.
    pub created_at: DateTime<Utc>,
}

impl QueueRecord {
    /// Create a new queue record stamped with the current time.
    pub fn new<E, K>(entity: E, key: K, kind: ChangeKind) -> Self
    where
        E: Into<String>,
        K: Into<String>,
    {
        QueueRecord {
            id: Uuid::new_v4(),
            entity: entity.into(),
            key: key.into(),
            kind,
            created_at: Utc::now(),
        }
    }
}
