//! Search-engine collaborator interface.
//!
//! The network client for the search engine is consumed behind the
//! [`SearchEngine`] trait: submit bulk document operations and administer
//! indices. [`DirectoryEngine`](crate::engine::directory::DirectoryEngine)
//! is the bundled filesystem implementation; remote engines plug in behind
//! the same trait.

use serde_json::Value;

use crate::engine::config::IndexConfiguration;
use crate::error::Result;

/// The document operation carried by one bulk item.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    /// Create or replace the document with the given body.
    Upsert(Value),
    /// Delete the document by id.
    Delete,
}

/// One document operation inside a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOp {
    /// Target index name.
    pub index: String,

    /// Document id.
    pub id: String,

    /// Operation to apply.
    pub action: BulkAction,
}

impl BulkOp {
    /// Create an upsert operation.
    pub fn upsert<I, D>(index: I, id: D, document: Value) -> Self
    where
        I: Into<String>,
        D: Into<String>,
    {
        BulkOp {
            index: index.into(),
            id: id.into(),
            action: BulkAction::Upsert(document),
        }
    }

    /// Create a delete operation.
    pub fn delete<I, D>(index: I, id: D) -> Self
    where
        I: Into<String>,
        D: Into<String>,
    {
        BulkOp {
            index: index.into(),
            id: id.into(),
            action: BulkAction::Delete,
        }
    }
}

/// Outcome of one item in a bulk response.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResult {
    /// Index the item addressed.
    pub index: String,

    /// Document id the item addressed.
    pub id: String,

    /// Engine error for this item, `None` on success.
    pub error: Option<String>,
}

impl BulkItemResult {
    /// A successful item result.
    pub fn ok<I: Into<String>, D: Into<String>>(index: I, id: D) -> Self {
        BulkItemResult {
            index: index.into(),
            id: id.into(),
            error: None,
        }
    }

    /// A failed item result.
    pub fn failed<I, D, E>(index: I, id: D, error: E) -> Self
    where
        I: Into<String>,
        D: Into<String>,
        E: Into<String>,
    {
        BulkItemResult {
            index: index.into(),
            id: id.into(),
            error: Some(error.into()),
        }
    }

    /// Whether this item succeeded.
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-item results of a bulk request, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    /// One result per submitted operation, positionally aligned.
    pub items: Vec<BulkItemResult>,
}

impl BulkResponse {
    /// Whether every item succeeded.
    pub fn is_fully_successful(&self) -> bool {
        self.items.iter().all(BulkItemResult::success)
    }

    /// The failed items.
    pub fn failures(&self) -> impl Iterator<Item = &BulkItemResult> {
        self.items.iter().filter(|item| !item.success())
    }
}

/// Live state of one index as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexState {
    /// Index name.
    pub name: String,

    /// Live field mapping.
    pub mapping: Value,

    /// Live settings, possibly including engine-added keys.
    pub settings: Value,
}

/// Client interface to the search engine.
pub trait SearchEngine: Send + Sync + std::fmt::Debug {
    /// Submit document operations as one bulk request.
    ///
    /// The response carries one item per operation, in request order. A
    /// returned error means the call as a whole failed and nothing can be
    /// assumed about individual items.
    fn bulk(&self, ops: &[BulkOp]) -> Result<BulkResponse>;

    /// Fetch an index's live mapping and settings; `None` if it does not exist.
    fn get_index(&self, name: &str) -> Result<Option<IndexState>>;

    /// Create an index with the given configuration.
    ///
    /// Fails if the index already exists.
    fn create_index(&self, config: &IndexConfiguration) -> Result<bool>;

    /// Delete an index by name; returns `false` if it did not exist.
    fn delete_index(&self, name: &str) -> Result<bool>;
}
