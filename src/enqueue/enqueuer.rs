//! Deduplicating enqueue API over the change-queue store.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use log::{debug, trace};

use crate::error::Result;
use crate::queue::record::{ChangeKind, QueueRecord};
use crate::queue::store::ChangeQueueStore;
use crate::store::{EntityInstance, PrimaryStore};

/// Writes change notifications into the queue.
///
/// Instances resolve to `(entity, key)` through the primary store; instances
/// whose key cannot be resolved are skipped silently, since not all entity
/// types are indexed. Heterogeneous batches are grouped by entity type so
/// each type gets one atomic queue append rather than one per instance.
#[derive(Debug, Clone)]
pub struct Enqueuer {
    queue: Arc<dyn ChangeQueueStore>,
    store: Arc<dyn PrimaryStore>,
}

impl Enqueuer {
    /// Create an enqueuer over the given queue and primary store.
    pub fn new(queue: Arc<dyn ChangeQueueStore>, store: Arc<dyn PrimaryStore>) -> Self {
        Enqueuer { queue, store }
    }

    /// Enqueue one instance.
    ///
    /// Returns the number of queue records written: 1, or 0 when the
    /// instance does not resolve to an indexable key.
    pub fn enqueue(&self, instance: &EntityInstance, kind: ChangeKind) -> Result<usize> {
        match self.store.primary_key_of(instance) {
            Some(key) => self.enqueue_keys(&instance.entity, &[key], kind),
            None => {
                debug!(
                    "skipping non-indexable instance of entity '{}'",
                    instance.entity
                );
                Ok(0)
            }
        }
    }

    /// Enqueue a heterogeneous batch of instances, grouped by entity type.
    ///
    /// Returns the total number of queue records written.
    pub fn enqueue_all(&self, instances: &[EntityInstance], kind: ChangeKind) -> Result<usize> {
        let mut grouped: AHashMap<&str, Vec<String>> = AHashMap::new();
        for instance in instances {
            match self.store.primary_key_of(instance) {
                Some(key) => grouped.entry(instance.entity.as_str()).or_default().push(key),
                None => debug!(
                    "skipping non-indexable instance of entity '{}'",
                    instance.entity
                ),
            }
        }

        let mut written = 0;
        for (entity, keys) in grouped {
            written += self.enqueue_keys(entity, &keys, kind)?;
        }
        Ok(written)
    }

    /// Enqueue changes for a set of primary keys of one entity type.
    ///
    /// Keys are deduplicated within the call; the records are appended as one
    /// atomic store operation. Returns the number of records written.
    pub fn enqueue_keys(&self, entity: &str, keys: &[String], kind: ChangeKind) -> Result<usize> {
        let mut seen = AHashSet::with_capacity(keys.len());
        let records: Vec<QueueRecord> = keys
            .iter()
            .filter(|key| seen.insert(key.as_str()))
            .map(|key| QueueRecord::new(entity, key.clone(), kind))
            .collect();

        let written = records.len();
        if written > 0 {
            trace!("enqueue {written} {kind} record(s) for entity '{entity}'");
            self.queue.append(records)?;
        }
        Ok(written)
    }
}
