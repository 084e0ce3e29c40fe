//! Index configuration resolution.
//!
//! The application declares which entity types are indexed and what their
//! index should look like. The [`IndexConfigResolver`] trait exposes those
//! declarations to the lifecycle manager and the indexer;
//! [`StaticConfigResolver`] is the bundled registry implementation.

use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::engine::config::IndexConfiguration;
use crate::error::{JavelinError, Result};

/// Supplies the desired index configuration per entity type.
pub trait IndexConfigResolver: Send + Sync + std::fmt::Debug {
    /// All declared configurations, in declaration order.
    fn all_configurations(&self) -> Vec<IndexConfiguration>;

    /// The configuration owning an entity type, `None` if it is not indexed.
    fn configuration_for(&self, entity: &str) -> Option<IndexConfiguration>;
}

/// One declaration binding an entity type to its index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverEntry {
    /// Entity type name.
    pub entity: String,

    /// Desired index configuration for the entity type.
    #[serde(flatten)]
    pub config: IndexConfiguration,
}

/// A fixed registry of entity-to-index declarations.
#[derive(Debug, Default)]
pub struct StaticConfigResolver {
    /// Declaration order, for stable synchronize-all runs.
    order: Vec<String>,
    configs: AHashMap<String, IndexConfiguration>,
}

impl StaticConfigResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        StaticConfigResolver::default()
    }

    /// Register an entity type's index configuration.
    ///
    /// Re-registering an entity type replaces its configuration.
    pub fn register<E: Into<String>>(&mut self, entity: E, config: IndexConfiguration) {
        let entity = entity.into();
        if !self.configs.contains_key(&entity) {
            self.order.push(entity.clone());
        }
        self.configs.insert(entity, config);
    }

    /// Load declarations from a JSON file holding an array of entries:
    /// `[{"entity": ..., "index_name": ..., "mapping": ..., "settings": ...}]`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            JavelinError::config(format!("cannot read index config {}: {e}", path.display()))
        })?;
        let entries: Vec<ResolverEntry> = serde_json::from_slice(&bytes)?;

        let mut resolver = StaticConfigResolver::new();
        for entry in entries {
            entry.config.validate()?;
            resolver.register(entry.entity, entry.config);
        }
        Ok(resolver)
    }

    /// Number of registered entity types.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no entity types are registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl IndexConfigResolver for StaticConfigResolver {
    fn all_configurations(&self) -> Vec<IndexConfiguration> {
        self.order
            .iter()
            .filter_map(|entity| self.configs.get(entity).cloned())
            .collect()
    }

    fn configuration_for(&self, entity: &str) -> Option<IndexConfiguration> {
        self.configs.get(entity).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn config(name: &str) -> IndexConfiguration {
        IndexConfiguration::new(name, json!({"name": {"type": "text"}}), json!({})).unwrap()
    }

    #[test]
    fn test_register_and_resolve() {
        let mut resolver = StaticConfigResolver::new();
        resolver.register("customer", config("search-customer"));
        resolver.register("order", config("search-order"));

        let found = resolver.configuration_for("customer").unwrap();
        assert_eq!(found.index_name, "search-customer");
        assert!(resolver.configuration_for("audit_log").is_none());

        let all = resolver.all_configurations();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].index_name, "search-customer");
        assert_eq!(all[1].index_name, "search-order");
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut resolver = StaticConfigResolver::new();
        resolver.register("customer", config("search-customer"));
        resolver.register("customer", config("search-customer-v2"));

        assert_eq!(resolver.len(), 1);
        assert_eq!(
            resolver.configuration_for("customer").unwrap().index_name,
            "search-customer-v2"
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let declarations = json!([
            {
                "entity": "customer",
                "index_name": "search-customer",
                "mapping": {"name": {"type": "text"}},
                "settings": {"analysis": {}}
            },
            {
                "entity": "order",
                "index_name": "search-order",
                "mapping": {"total": {"type": "double"}}
            }
        ]);
        file.write_all(declarations.to_string().as_bytes()).unwrap();

        let resolver = StaticConfigResolver::from_file(file.path()).unwrap();
        assert_eq!(resolver.len(), 2);
        let order = resolver.configuration_for("order").unwrap();
        assert_eq!(order.index_name, "search-order");
        assert_eq!(order.settings, json!({}));
    }

    #[test]
    fn test_from_file_rejects_invalid_index_name() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let declarations = json!([
            {"entity": "customer", "index_name": "Bad Name", "mapping": {}}
        ]);
        file.write_all(declarations.to_string().as_bytes()).unwrap();

        assert!(StaticConfigResolver::from_file(file.path()).is_err());
    }
}
