//! Index configuration value object and drift comparison.
//!
//! An [`IndexConfiguration`] is the desired mapping and settings of one
//! logical index. It is compared structurally against the live index state,
//! never mutated in place. Comparison runs on normalized JSON trees so that
//! representational noise — key order, explicit nulls, empty containers —
//! does not register as drift.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::client::IndexState;
use crate::error::{JavelinError, Result};

lazy_static! {
    /// Engine index naming rules: lowercase, no leading punctuation, none of
    /// the characters the engine reserves.
    static ref INDEX_NAME_RE: Regex = Regex::new(r"^[a-z0-9][a-z0-9._-]*$").unwrap();
}

/// Maximum index name length accepted by the engine.
const MAX_INDEX_NAME_LEN: usize = 255;

/// Desired mapping and settings for one logical index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfiguration {
    /// Index name.
    pub index_name: String,

    /// Field-name to field-descriptor mapping.
    pub mapping: Value,

    /// Analysis definitions and shard/replica hints.
    #[serde(default = "empty_object")]
    pub settings: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl IndexConfiguration {
    /// Create a validated configuration.
    pub fn new<N: Into<String>>(index_name: N, mapping: Value, settings: Value) -> Result<Self> {
        let config = IndexConfiguration {
            index_name: index_name.into(),
            mapping,
            settings,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the index name against the engine's naming rules.
    pub fn validate(&self) -> Result<()> {
        let name = &self.index_name;
        if name.len() > MAX_INDEX_NAME_LEN || !INDEX_NAME_RE.is_match(name) {
            return Err(JavelinError::config(format!(
                "'{name}' is not a valid index name"
            )));
        }
        Ok(())
    }

    /// Whether a live index satisfies this configuration.
    ///
    /// The mapping must match exactly after normalization. The settings must
    /// be contained in the live settings: engines report extra keys of their
    /// own (uuid, creation date, version) that do not count as drift.
    pub fn is_satisfied_by(&self, state: &IndexState) -> bool {
        normalize(&self.mapping) == normalize(&state.mapping)
            && contains(&normalize(&state.settings), &normalize(&self.settings))
    }
}

/// Normalize a JSON tree for structural comparison.
///
/// Nulls, empty strings, empty arrays, and empty objects are pruned
/// recursively; object key order is irrelevant to begin with because
/// comparison goes through `serde_json::Map`.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut normalized = Map::new();
            for (key, child) in map {
                let child = normalize(child);
                if !is_empty(&child) {
                    normalized.insert(key.clone(), child);
                }
            }
            Value::Object(normalized)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(normalize)
                .filter(|item| !is_empty(item))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Whether `desired` is structurally contained in `live`: every desired
/// object key must be present in `live` with a contained value; non-object
/// values must be equal.
fn contains(live: &Value, desired: &Value) -> bool {
    match (live, desired) {
        (Value::Object(live), Value::Object(desired)) => desired
            .iter()
            .all(|(key, value)| live.get(key).is_some_and(|l| contains(l, value))),
        (live, desired) => live == desired,
    }
}
