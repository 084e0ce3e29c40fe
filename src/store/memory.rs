//! In-memory primary store for tests and embedding.

use ahash::AHashMap;
use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{JavelinError, Result};
use crate::store::{EntityInstance, PrimaryStore, SourceRecord, key_from_value};

#[derive(Debug)]
struct EntityTable {
    /// Document field holding the primary key.
    key_field: String,
    /// Rows in insertion order; keys are unique.
    rows: Vec<SourceRecord>,
}

/// An in-memory implementation of [`PrimaryStore`].
///
/// Entity types must be registered with the name of their key field before
/// rows can be saved. Unregistered entity types resolve no primary keys,
/// mirroring entity types that are not indexed at all.
#[derive(Debug, Default)]
pub struct MemoryPrimaryStore {
    tables: RwLock<AHashMap<String, EntityTable>>,
}

impl MemoryPrimaryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        MemoryPrimaryStore::default()
    }

    /// Register an entity type and the document field holding its key.
    pub fn register_entity<E, F>(&self, entity: E, key_field: F)
    where
        E: Into<String>,
        F: Into<String>,
    {
        self.tables.write().insert(
            entity.into(),
            EntityTable {
                key_field: key_field.into(),
                rows: Vec::new(),
            },
        );
    }

    /// Insert or replace a row; returns its primary key.
    pub fn save(&self, entity: &str, document: Value) -> Result<String> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(entity)
            .ok_or_else(|| JavelinError::store(format!("unknown entity type '{entity}'")))?;
        let key = document
            .get(&table.key_field)
            .and_then(key_from_value)
            .ok_or_else(|| {
                JavelinError::store(format!(
                    "document for '{entity}' has no usable '{}' key",
                    table.key_field
                ))
            })?;

        if let Some(row) = table.rows.iter_mut().find(|r| r.key == key) {
            row.document = document;
        } else {
            table.rows.push(SourceRecord {
                key: key.clone(),
                document,
            });
        }
        Ok(key)
    }

    /// Delete a row by key; returns whether it existed.
    pub fn delete(&self, entity: &str, key: &str) -> Result<bool> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(entity)
            .ok_or_else(|| JavelinError::store(format!("unknown entity type '{entity}'")))?;
        let before = table.rows.len();
        table.rows.retain(|r| r.key != key);
        Ok(table.rows.len() < before)
    }

    /// Number of rows stored for an entity type.
    pub fn row_count(&self, entity: &str) -> usize {
        self.tables
            .read()
            .get(entity)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }
}

impl PrimaryStore for MemoryPrimaryStore {
    fn primary_key_of(&self, instance: &EntityInstance) -> Option<String> {
        let tables = self.tables.read();
        let table = tables.get(&instance.entity)?;
        instance.document.get(&table.key_field).and_then(key_from_value)
    }

    fn load_by_keys(&self, entity: &str, keys: &[String]) -> Result<Vec<SourceRecord>> {
        let tables = self.tables.read();
        let table = tables
            .get(entity)
            .ok_or_else(|| JavelinError::store(format!("unknown entity type '{entity}'")))?;
        let mut records = Vec::new();
        for key in keys {
            if let Some(row) = table.rows.iter().find(|r| &r.key == key) {
                records.push(row.clone());
            }
        }
        Ok(records)
    }

    fn page_keys(&self, entity: &str, offset: usize, limit: usize) -> Result<Vec<String>> {
        let tables = self.tables.read();
        let table = tables
            .get(entity)
            .ok_or_else(|| JavelinError::store(format!("unknown entity type '{entity}'")))?;
        Ok(table
            .rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|r| r.key.clone())
            .collect())
    }
}
