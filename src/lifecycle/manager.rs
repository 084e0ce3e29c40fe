//! The index lifecycle manager.
//!
//! Compares desired index configurations against the live engine state and
//! creates, leaves untouched, or drops-and-recreates indices. The engine is
//! the sole source of truth on every run; no recreation history is kept. An
//! index is always either absent, present-and-current, or present-and-stale
//! — recreation is drop-then-create, never in-place migration.

use std::sync::Arc;

use log::{debug, error, info};

use crate::engine::client::SearchEngine;
use crate::engine::config::IndexConfiguration;
use crate::engine::resolver::IndexConfigResolver;
use crate::error::Result;

/// What `synchronize_index` did to one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The index was absent and has been created.
    Created,
    /// The index was stale and has been dropped and recreated.
    Recreated,
    /// The index already matched its configuration.
    Unchanged,
}

/// Per-index result of a `synchronize_all` run.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    /// Synchronization finished with the given outcome.
    Done(SyncOutcome),
    /// Synchronization failed; the other indices were still processed.
    Failed(String),
}

/// Outcome of synchronizing every declared index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// `(index name, status)` per declared configuration, in declaration order.
    pub entries: Vec<(String, SyncStatus)>,
}

impl SyncReport {
    /// Whether any index failed to synchronize.
    pub fn has_failures(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, status)| matches!(status, SyncStatus::Failed(_)))
    }

    /// The failed entries.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(name, status)| match status {
            SyncStatus::Failed(error) => Some((name.as_str(), error.as_str())),
            SyncStatus::Done(_) => None,
        })
    }
}

/// Manages search indices against their declared configurations.
#[derive(Debug)]
pub struct IndexLifecycleManager {
    engine: Arc<dyn SearchEngine>,
    resolver: Arc<dyn IndexConfigResolver>,
}

impl IndexLifecycleManager {
    /// Create a manager over an engine and a configuration resolver.
    pub fn new(engine: Arc<dyn SearchEngine>, resolver: Arc<dyn IndexConfigResolver>) -> Self {
        IndexLifecycleManager { engine, resolver }
    }

    /// Whether an index exists.
    pub fn index_exists(&self, name: &str) -> Result<bool> {
        Ok(self.engine.get_index(name)?.is_some())
    }

    /// Create an index if it is absent.
    ///
    /// Returns `true` on creation and on an already-existing index alike;
    /// creation is only attempted when the index is absent.
    pub fn create_index(&self, config: &IndexConfiguration) -> Result<bool> {
        config.validate()?;
        if self.index_exists(&config.index_name)? {
            debug!("index '{}' already exists", config.index_name);
            return Ok(true);
        }
        info!("creating index '{}'", config.index_name);
        self.engine.create_index(config)
    }

    /// Drop an index by name; returns `false` if it did not exist.
    pub fn drop_index(&self, name: &str) -> Result<bool> {
        info!("dropping index '{name}'");
        self.engine.delete_index(name)
    }

    /// Drop the index if it exists, then create it from `config`.
    pub fn recreate_index(&self, config: &IndexConfiguration) -> Result<bool> {
        config.validate()?;
        if self.index_exists(&config.index_name)? {
            self.drop_index(&config.index_name)?;
        }
        info!("creating index '{}'", config.index_name);
        self.engine.create_index(config)
    }

    /// Whether the live index matches `config` after normalization.
    ///
    /// An absent index is not current.
    pub fn is_index_current(&self, config: &IndexConfiguration) -> Result<bool> {
        match self.engine.get_index(&config.index_name)? {
            Some(state) => Ok(config.is_satisfied_by(&state)),
            None => Ok(false),
        }
    }

    /// Bring one index up to date with its configuration.
    ///
    /// Absent indices are created, stale indices are dropped and recreated,
    /// current indices are left untouched.
    pub fn synchronize_index(&self, config: &IndexConfiguration) -> Result<SyncOutcome> {
        config.validate()?;
        match self.engine.get_index(&config.index_name)? {
            None => {
                info!("index '{}' is absent, creating it", config.index_name);
                self.engine.create_index(config)?;
                Ok(SyncOutcome::Created)
            }
            Some(state) if config.is_satisfied_by(&state) => {
                debug!("index '{}' is current", config.index_name);
                Ok(SyncOutcome::Unchanged)
            }
            Some(_) => {
                info!(
                    "index '{}' drifted from its configuration, recreating it",
                    config.index_name
                );
                self.engine.delete_index(&config.index_name)?;
                self.engine.create_index(config)?;
                Ok(SyncOutcome::Recreated)
            }
        }
    }

    /// Bring every declared index up to date.
    ///
    /// Indices are synchronized independently: one failure is reported in
    /// the returned [`SyncReport`] and does not abort the others.
    pub fn synchronize_all(&self) -> SyncReport {
        let mut report = SyncReport::default();
        for config in self.resolver.all_configurations() {
            let status = match self.synchronize_index(&config) {
                Ok(outcome) => SyncStatus::Done(outcome),
                Err(e) => {
                    error!("failed to synchronize index '{}': {e}", config.index_name);
                    SyncStatus::Failed(e.to_string())
                }
            };
            report.entries.push((config.index_name.clone(), status));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::client::{BulkOp, BulkResponse, IndexState};
    use crate::engine::resolver::StaticConfigResolver;
    use crate::error::JavelinError;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Engine fake tracking index admin calls, with injectable state and
    /// per-index get failures.
    #[derive(Debug, Default)]
    struct AdminEngine {
        indices: Mutex<Vec<IndexState>>,
        creates: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
        failing_gets: Mutex<Vec<String>>,
    }

    impl AdminEngine {
        fn with_index(self, config: &IndexConfiguration) -> Self {
            self.indices.lock().push(IndexState {
                name: config.index_name.clone(),
                mapping: config.mapping.clone(),
                settings: config.settings.clone(),
            });
            self
        }

        fn fail_get(&self, name: &str) {
            self.failing_gets.lock().push(name.to_string());
        }
    }

    impl SearchEngine for AdminEngine {
        fn bulk(&self, _ops: &[BulkOp]) -> Result<BulkResponse> {
            Ok(BulkResponse::default())
        }

        fn get_index(&self, name: &str) -> Result<Option<IndexState>> {
            if self.failing_gets.lock().iter().any(|n| n == name) {
                return Err(JavelinError::engine("cluster unreachable"));
            }
            Ok(self.indices.lock().iter().find(|s| s.name == name).cloned())
        }

        fn create_index(&self, config: &IndexConfiguration) -> Result<bool> {
            self.creates.lock().push(config.index_name.clone());
            self.indices.lock().push(IndexState {
                name: config.index_name.clone(),
                mapping: config.mapping.clone(),
                settings: config.settings.clone(),
            });
            Ok(true)
        }

        fn delete_index(&self, name: &str) -> Result<bool> {
            self.deletes.lock().push(name.to_string());
            let mut indices = self.indices.lock();
            let before = indices.len();
            indices.retain(|s| s.name != name);
            Ok(indices.len() < before)
        }
    }

    fn config(name: &str, mapping: serde_json::Value) -> IndexConfiguration {
        IndexConfiguration::new(name, mapping, json!({})).unwrap()
    }

    fn manager(engine: Arc<AdminEngine>, resolver: StaticConfigResolver) -> IndexLifecycleManager {
        IndexLifecycleManager::new(engine, Arc::new(resolver))
    }

    #[test]
    fn test_synchronize_absent_index_creates_once() {
        let engine = Arc::new(AdminEngine::default());
        let manager = manager(engine.clone(), StaticConfigResolver::new());
        let config = config("customers", json!({"name": {"type": "text"}}));

        let outcome = manager.synchronize_index(&config).unwrap();

        assert_eq!(outcome, SyncOutcome::Created);
        assert_eq!(engine.creates.lock().as_slice(), ["customers"]);
        assert!(engine.deletes.lock().is_empty());
    }

    #[test]
    fn test_synchronize_current_index_is_a_no_op() {
        let config = config("customers", json!({"name": {"type": "text"}}));
        let engine = Arc::new(AdminEngine::default().with_index(&config));
        let manager = manager(engine.clone(), StaticConfigResolver::new());

        let outcome = manager.synchronize_index(&config).unwrap();

        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert!(engine.creates.lock().is_empty());
        assert!(engine.deletes.lock().is_empty());
    }

    #[test]
    fn test_synchronize_stale_index_drops_then_creates() {
        let live = config("customers", json!({"name": {"type": "keyword"}}));
        let desired = config("customers", json!({"name": {"type": "text"}}));
        let engine = Arc::new(AdminEngine::default().with_index(&live));
        let manager = manager(engine.clone(), StaticConfigResolver::new());

        let outcome = manager.synchronize_index(&desired).unwrap();

        assert_eq!(outcome, SyncOutcome::Recreated);
        assert_eq!(engine.deletes.lock().as_slice(), ["customers"]);
        assert_eq!(engine.creates.lock().as_slice(), ["customers"]);
        // The recreated index now reports as current.
        assert!(manager.is_index_current(&desired).unwrap());
    }

    #[test]
    fn test_create_index_is_idempotent() {
        let config = config("customers", json!({"name": {"type": "text"}}));
        let engine = Arc::new(AdminEngine::default().with_index(&config));
        let manager = manager(engine.clone(), StaticConfigResolver::new());

        assert!(manager.create_index(&config).unwrap());
        assert!(engine.creates.lock().is_empty());
    }

    #[test]
    fn test_recreate_absent_index_skips_drop() {
        let config = config("customers", json!({"name": {"type": "text"}}));
        let engine = Arc::new(AdminEngine::default());
        let manager = manager(engine.clone(), StaticConfigResolver::new());

        assert!(manager.recreate_index(&config).unwrap());
        assert!(engine.deletes.lock().is_empty());
        assert_eq!(engine.creates.lock().as_slice(), ["customers"]);
    }

    #[test]
    fn test_is_index_current_on_absent_index() {
        let engine = Arc::new(AdminEngine::default());
        let manager = manager(engine, StaticConfigResolver::new());
        let config = config("customers", json!({}));

        assert!(!manager.is_index_current(&config).unwrap());
    }

    #[test]
    fn test_synchronize_all_isolates_failures() {
        let healthy = config("customers", json!({"name": {"type": "text"}}));
        let failing = config("orders", json!({"total": {"type": "double"}}));

        let mut resolver = StaticConfigResolver::new();
        resolver.register("order", failing.clone());
        resolver.register("customer", healthy.clone());

        let engine = Arc::new(AdminEngine::default());
        engine.fail_get("orders");
        let manager = manager(engine.clone(), resolver);

        let report = manager.synchronize_all();

        assert!(report.has_failures());
        assert_eq!(report.entries.len(), 2);
        assert_eq!(
            report.entries[0],
            (
                "orders".to_string(),
                SyncStatus::Failed("Engine error: cluster unreachable".to_string())
            )
        );
        assert_eq!(
            report.entries[1],
            ("customers".to_string(), SyncStatus::Done(SyncOutcome::Created))
        );
        // The healthy index really was created despite the earlier failure.
        assert_eq!(engine.creates.lock().as_slice(), ["customers"]);
    }

    #[test]
    fn test_sync_report_failures_iterator() {
        let report = SyncReport {
            entries: vec![
                ("a".to_string(), SyncStatus::Done(SyncOutcome::Unchanged)),
                ("b".to_string(), SyncStatus::Failed("boom".to_string())),
            ],
        };

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures, vec![("b", "boom")]);
    }
}
