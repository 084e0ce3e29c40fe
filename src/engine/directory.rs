//! Directory-backed search engine.
//!
//! A filesystem implementation of [`SearchEngine`] used by the CLI,
//! integration tests, and local development. Each index is a subdirectory
//! holding `mapping.json`, `settings.json`, and a `docs/` directory with one
//! JSON file per document. Bulk operations report per-item results the way a
//! remote engine does; deleting a missing document succeeds because delete is
//! idempotent.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;

use crate::engine::client::{
    BulkAction, BulkItemResult, BulkOp, BulkResponse, IndexState, SearchEngine,
};
use crate::engine::config::IndexConfiguration;
use crate::error::{JavelinError, Result};

const MAPPING_FILE: &str = "mapping.json";
const SETTINGS_FILE: &str = "settings.json";
const DOCS_DIR: &str = "docs";

/// A filesystem-backed [`SearchEngine`].
#[derive(Debug)]
pub struct DirectoryEngine {
    root: PathBuf,
    /// Serializes index admin and bulk mutations.
    write_lock: Mutex<()>,
}

impl DirectoryEngine {
    /// Open an engine rooted at `root`, creating the directory if absent.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(DirectoryEngine {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Names of all indices, sorted.
    pub fn list_indices(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Number of documents in an index.
    pub fn doc_count(&self, name: &str) -> Result<usize> {
        let docs = self.index_dir(name).join(DOCS_DIR);
        if !docs.is_dir() {
            return Ok(0);
        }
        Ok(std::fs::read_dir(&docs)?.count())
    }

    /// Read one document by id, `None` if absent.
    pub fn get_document(&self, index: &str, id: &str) -> Result<Option<Value>> {
        let Ok(path) = self.doc_path(index, id) else {
            return Ok(None);
        };
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn index_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn doc_path(&self, index: &str, id: &str) -> Result<PathBuf> {
        let usable = !id.is_empty()
            && id != "."
            && id != ".."
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !usable {
            return Err(JavelinError::engine(format!(
                "'{id}' is not usable as a document id"
            )));
        }
        Ok(self.index_dir(index).join(DOCS_DIR).join(format!("{id}.json")))
    }

    fn apply_item(&self, op: &BulkOp) -> std::result::Result<(), String> {
        let dir = self.index_dir(&op.index);
        if !dir.is_dir() {
            return Err(format!("index '{}' does not exist", op.index));
        }
        let path = self.doc_path(&op.index, &op.id).map_err(|e| e.to_string())?;

        match &op.action {
            BulkAction::Upsert(document) => {
                let bytes = serde_json::to_vec_pretty(document).map_err(|e| e.to_string())?;
                std::fs::write(&path, bytes).map_err(|e| e.to_string())
            }
            BulkAction::Delete => match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                // Deleting a missing document is a success.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.to_string()),
            },
        }
    }
}

impl SearchEngine for DirectoryEngine {
    fn bulk(&self, ops: &[BulkOp]) -> Result<BulkResponse> {
        let _guard = self.write_lock.lock();
        let mut items = Vec::with_capacity(ops.len());
        for op in ops {
            let item = match self.apply_item(op) {
                Ok(()) => BulkItemResult::ok(op.index.clone(), op.id.clone()),
                Err(error) => BulkItemResult::failed(op.index.clone(), op.id.clone(), error),
            };
            items.push(item);
        }
        Ok(BulkResponse { items })
    }

    fn get_index(&self, name: &str) -> Result<Option<IndexState>> {
        let dir = self.index_dir(name);
        if !dir.is_dir() {
            return Ok(None);
        }
        let mapping: Value = serde_json::from_slice(&std::fs::read(dir.join(MAPPING_FILE))?)?;
        let settings: Value = serde_json::from_slice(&std::fs::read(dir.join(SETTINGS_FILE))?)?;
        Ok(Some(IndexState {
            name: name.to_string(),
            mapping,
            settings,
        }))
    }

    fn create_index(&self, config: &IndexConfiguration) -> Result<bool> {
        config.validate()?;
        let _guard = self.write_lock.lock();
        let dir = self.index_dir(&config.index_name);
        if dir.is_dir() {
            return Err(JavelinError::engine(format!(
                "index '{}' already exists",
                config.index_name
            )));
        }
        std::fs::create_dir_all(dir.join(DOCS_DIR))?;
        std::fs::write(
            dir.join(MAPPING_FILE),
            serde_json::to_vec_pretty(&config.mapping)?,
        )?;
        std::fs::write(
            dir.join(SETTINGS_FILE),
            serde_json::to_vec_pretty(&config.settings)?,
        )?;
        Ok(true)
    }

    fn delete_index(&self, name: &str) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let dir = self.index_dir(name);
        if !dir.is_dir() {
            return Ok(false);
        }
        std::fs::remove_dir_all(dir)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(name: &str) -> IndexConfiguration {
        IndexConfiguration::new(name, json!({"name": {"type": "text"}}), json!({})).unwrap()
    }

    #[test]
    fn test_index_admin_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DirectoryEngine::open(dir.path()).unwrap();

        assert!(engine.get_index("customers").unwrap().is_none());
        assert!(engine.create_index(&config("customers")).unwrap());

        let state = engine.get_index("customers").unwrap().unwrap();
        assert_eq!(state.name, "customers");
        assert_eq!(state.mapping, json!({"name": {"type": "text"}}));

        assert!(engine.delete_index("customers").unwrap());
        assert!(!engine.delete_index("customers").unwrap());
        assert!(engine.get_index("customers").unwrap().is_none());
    }

    #[test]
    fn test_create_existing_index_fails() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DirectoryEngine::open(dir.path()).unwrap();

        engine.create_index(&config("customers")).unwrap();
        assert!(engine.create_index(&config("customers")).is_err());
    }

    #[test]
    fn test_bulk_upsert_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DirectoryEngine::open(dir.path()).unwrap();
        engine.create_index(&config("customers")).unwrap();

        let response = engine
            .bulk(&[
                BulkOp::upsert("customers", "1", json!({"name": "ada"})),
                BulkOp::upsert("customers", "2", json!({"name": "grace"})),
            ])
            .unwrap();
        assert!(response.is_fully_successful());
        assert_eq!(engine.doc_count("customers").unwrap(), 2);
        assert_eq!(
            engine.get_document("customers", "1").unwrap().unwrap(),
            json!({"name": "ada"})
        );

        let response = engine
            .bulk(&[
                BulkOp::delete("customers", "1"),
                // Idempotent: removing a missing doc succeeds.
                BulkOp::delete("customers", "missing"),
            ])
            .unwrap();
        assert!(response.is_fully_successful());
        assert_eq!(engine.doc_count("customers").unwrap(), 1);
    }

    #[test]
    fn test_bulk_reports_per_item_failures() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DirectoryEngine::open(dir.path()).unwrap();
        engine.create_index(&config("customers")).unwrap();

        let response = engine
            .bulk(&[
                BulkOp::upsert("customers", "1", json!({"name": "ada"})),
                BulkOp::upsert("nowhere", "2", json!({"name": "grace"})),
            ])
            .unwrap();

        assert!(!response.is_fully_successful());
        assert!(response.items[0].success());
        assert!(!response.items[1].success());
        assert!(
            response.items[1]
                .error
                .as_deref()
                .unwrap()
                .contains("does not exist")
        );
    }

    #[test]
    fn test_list_indices() {
        let dir = tempfile::tempdir().unwrap();
        let engine = DirectoryEngine::open(dir.path()).unwrap();
        engine.create_index(&config("orders")).unwrap();
        engine.create_index(&config("customers")).unwrap();

        assert_eq!(engine.list_indices().unwrap(), vec!["customers", "orders"]);
    }
}
