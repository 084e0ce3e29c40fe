//! Directory-backed primary store.
//!
//! A development-grade [`PrimaryStore`] over a directory tree: one
//! subdirectory per entity type, one `<key>.json` file per record. The CLI
//! uses it to drive the pipeline end-to-end without a database; deployments
//! implement [`PrimaryStore`] against their real store instead.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{JavelinError, Result};
use crate::store::{EntityInstance, PrimaryStore, SourceRecord, key_from_value};

/// A [`PrimaryStore`] reading records from `<root>/<entity>/<key>.json`.
#[derive(Debug)]
pub struct DirectoryPrimaryStore {
    root: PathBuf,
    /// Document field holding the primary key.
    key_field: String,
}

impl DirectoryPrimaryStore {
    /// Open a store rooted at `root` with the default `id` key field.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::with_key_field(root, "id")
    }

    /// Open a store rooted at `root` with a custom key field.
    pub fn with_key_field<P: AsRef<Path>, F: Into<String>>(root: P, key_field: F) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(DirectoryPrimaryStore {
            root,
            key_field: key_field.into(),
        })
    }

    /// Write a record file; returns its primary key.
    pub fn save(&self, entity: &str, document: &Value) -> Result<String> {
        let key = document
            .get(&self.key_field)
            .and_then(key_from_value)
            .ok_or_else(|| {
                JavelinError::store(format!(
                    "document for '{entity}' has no usable '{}' key",
                    self.key_field
                ))
            })?;
        let path = self.record_path(entity, &key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, serde_json::to_vec_pretty(document)?)?;
        Ok(key)
    }

    fn entity_dir(&self, entity: &str) -> Result<PathBuf> {
        validate_name(entity)?;
        Ok(self.root.join(entity))
    }

    fn record_path(&self, entity: &str, key: &str) -> Result<PathBuf> {
        validate_name(key)?;
        Ok(self.entity_dir(entity)?.join(format!("{key}.json")))
    }

    /// All keys of an entity type, sorted for stable pagination.
    fn all_keys(&self, entity: &str) -> Result<Vec<String>> {
        let dir = self.entity_dir(entity)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Entity names and keys become path components; restrict them to characters
/// that cannot escape the store root.
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(JavelinError::store(format!(
            "'{name}' is not usable as a file-backed entity name or key"
        )))
    }
}

impl PrimaryStore for DirectoryPrimaryStore {
    fn primary_key_of(&self, instance: &EntityInstance) -> Option<String> {
        // Only entity types with a record directory are indexed.
        let dir = self.entity_dir(&instance.entity).ok()?;
        if !dir.is_dir() {
            return None;
        }
        instance.document.get(&self.key_field).and_then(key_from_value)
    }

    fn load_by_keys(&self, entity: &str, keys: &[String]) -> Result<Vec<SourceRecord>> {
        let mut records = Vec::new();
        for key in keys {
            let path = self.record_path(entity, key)?;
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let document: Value = serde_json::from_slice(&bytes)?;
            records.push(SourceRecord {
                key: key.clone(),
                document,
            });
        }
        Ok(records)
    }

    fn page_keys(&self, entity: &str, offset: usize, limit: usize) -> Result<Vec<String>> {
        let keys = self.all_keys(entity)?;
        Ok(keys.into_iter().skip(offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_load_page() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryPrimaryStore::open(dir.path()).unwrap();

        for i in 0..3 {
            store
                .save("customer", &json!({"id": format!("c{i}"), "name": format!("n{i}")}))
                .unwrap();
        }

        let keys = store.page_keys("customer", 0, 10).unwrap();
        assert_eq!(keys, vec!["c0", "c1", "c2"]);

        let records = store
            .load_by_keys("customer", &["c1".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].document["name"], json!("n1"));
    }

    #[test]
    fn test_primary_key_requires_entity_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryPrimaryStore::open(dir.path()).unwrap();
        store.save("customer", &json!({"id": "c1"})).unwrap();

        let known = EntityInstance::new("customer", json!({"id": "c9"}));
        assert_eq!(store.primary_key_of(&known), Some("c9".to_string()));

        let unknown = EntityInstance::new("audit_log", json!({"id": "c9"}));
        assert_eq!(store.primary_key_of(&unknown), None);
    }

    #[test]
    fn test_rejects_path_escaping_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryPrimaryStore::open(dir.path()).unwrap();

        assert!(store.save("customer", &json!({"id": "../evil"})).is_err());
        assert!(store.load_by_keys("..", &["x".to_string()]).is_err());
    }

    #[test]
    fn test_pagination_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryPrimaryStore::open(dir.path()).unwrap();
        for i in 0..5 {
            store.save("customer", &json!({"id": format!("c{i}")})).unwrap();
        }

        let first = store.page_keys("customer", 0, 2).unwrap();
        let second = store.page_keys("customer", 2, 2).unwrap();
        let third = store.page_keys("customer", 4, 2).unwrap();
        assert_eq!(first, vec!["c0", "c1"]);
        assert_eq!(second, vec!["c2", "c3"]);
        assert_eq!(third, vec!["c4"]);
    }
}
