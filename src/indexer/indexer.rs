//! The batch indexer: drains the change queue and applies bulk operations.

use std::sync::Arc;

use ahash::AHashMap;
use log::{debug, error, warn};
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::engine::client::{BulkOp, SearchEngine};
use crate::engine::config::IndexConfiguration;
use crate::engine::resolver::IndexConfigResolver;
use crate::error::{JavelinError, Result};
use crate::queue::record::{ChangeKind, QueueRecord};
use crate::queue::store::{ChangeQueueStore, QueueFailure};
use crate::store::PrimaryStore;

/// Drains the change queue in bounded batches and applies the corresponding
/// bulk operations to the search engine.
///
/// Delivery is at-least-once: a queue record is removed only after the
/// engine acknowledged its operation. A bulk call that fails as a whole
/// leaves the batch queued for the next run; per-item failures keep only the
/// failed records queued, and records that exhaust their retry budget are
/// dead-lettered by the store.
///
/// Concurrent `process_queue` calls on one indexer serialize on an internal
/// drain lock, so at most one drain cycle runs at a time. Enqueues are not
/// blocked by a running drain.
#[derive(Debug)]
pub struct BatchIndexer {
    queue: Arc<dyn ChangeQueueStore>,
    engine: Arc<dyn SearchEngine>,
    store: Arc<dyn PrimaryStore>,
    resolver: Arc<dyn IndexConfigResolver>,
    drain_lock: Mutex<()>,
}

impl BatchIndexer {
    /// Create an indexer over its four collaborators.
    pub fn new(
        queue: Arc<dyn ChangeQueueStore>,
        engine: Arc<dyn SearchEngine>,
        store: Arc<dyn PrimaryStore>,
        resolver: Arc<dyn IndexConfigResolver>,
    ) -> Self {
        BatchIndexer {
            queue,
            engine,
            store,
            resolver,
            drain_lock: Mutex::new(()),
        }
    }

    /// Drain the queue in batches of `batch_size` oldest-first records.
    ///
    /// Stops when the queue is empty, when a batch comes back smaller than
    /// `batch_size`, or when handling another full batch would push the
    /// total past `max_processed` (`0` = unlimited). Returns the number of
    /// records handled in this run.
    pub fn process_queue(&self, batch_size: usize, max_processed: usize) -> Result<usize> {
        if batch_size == 0 {
            error!("queue drain batch size must be positive");
            return Err(JavelinError::config(
                "queue drain batch size must be positive",
            ));
        }

        let _guard = self.drain_lock.lock();
        let mut processed = 0;

        loop {
            let batch = self.queue.peek_oldest(batch_size)?;
            if batch.is_empty() {
                break;
            }
            if max_processed > 0 && processed + batch.len() > max_processed {
                break;
            }
            debug!("dequeued {} record(s)", batch.len());

            let progress = self.process_batch(&batch)?;
            processed += batch.len();

            if progress == 0 {
                // Every record in the batch failed and stays queued; looping
                // again would resubmit the same head-of-queue immediately.
                warn!(
                    "queue drain made no progress; {} record(s) left for the next run",
                    self.queue.len()?
                );
                break;
            }
            if batch.len() < batch_size {
                break;
            }
        }

        Ok(processed)
    }

    /// Handle one batch. Returns the number of records settled — removed or
    /// dead-lettered; records kept queued for retry do not count.
    fn process_batch(&self, batch: &[QueueRecord]) -> Result<usize> {
        let configs = self.resolve_configs(batch);
        let documents = self.load_upsert_documents(batch, &configs)?;

        let mut unconfigured: Vec<Uuid> = Vec::new();
        let mut ops: Vec<BulkOp> = Vec::with_capacity(batch.len());
        let mut op_ids: Vec<Uuid> = Vec::with_capacity(batch.len());

        for record in batch {
            let Some(config) = configs.get(record.entity.as_str()).and_then(Option::as_ref)
            else {
                unconfigured.push(record.id);
                continue;
            };
            let index = config.index_name.as_str();

            let op = match record.kind {
                ChangeKind::Delete => BulkOp::delete(index, record.key.clone()),
                ChangeKind::Upsert => {
                    match documents
                        .get(record.entity.as_str())
                        .and_then(|docs| docs.get(record.key.as_str()))
                    {
                        Some(document) => {
                            BulkOp::upsert(index, record.key.clone(), document.clone())
                        }
                        // The row vanished between enqueue and drain; drop
                        // the document instead of keeping a ghost.
                        None => {
                            debug!(
                                "source row '{}' of entity '{}' is gone; deleting its document",
                                record.key, record.entity
                            );
                            BulkOp::delete(index, record.key.clone())
                        }
                    }
                }
            };
            ops.push(op);
            op_ids.push(record.id);
        }

        let mut settled = 0;
        if !unconfigured.is_empty() {
            warn!(
                "dropping {} record(s) of entity types with no index configuration",
                unconfigured.len()
            );
            settled += self.queue.remove(&unconfigured)?;
        }
        if ops.is_empty() {
            return Ok(settled);
        }

        // A transport-level failure propagates here with the batch intact in
        // the queue, which is what guarantees redelivery.
        let response = self.engine.bulk(&ops)?;
        if response.items.len() != ops.len() {
            return Err(JavelinError::engine(format!(
                "bulk response carries {} item(s) for {} operation(s)",
                response.items.len(),
                ops.len()
            )));
        }

        let mut succeeded: Vec<Uuid> = Vec::with_capacity(op_ids.len());
        let mut failures: Vec<QueueFailure> = Vec::new();
        for (id, item) in op_ids.iter().zip(&response.items) {
            if item.success() {
                succeeded.push(*id);
            } else {
                failures.push(QueueFailure {
                    id: *id,
                    error: item.error.clone().unwrap_or_else(|| "unknown error".to_string()),
                });
            }
        }

        settled += self.queue.remove(&succeeded)?;

        if !failures.is_empty() {
            warn!(
                "{} of {} bulk item(s) failed; keeping them queued for retry",
                failures.len(),
                ops.len()
            );
            let dead = self.queue.record_failures(&failures)?;
            for letter in &dead {
                error!(
                    "dead-lettered {} of entity '{}' key '{}' after {} attempt(s): {}",
                    letter.record.kind,
                    letter.record.entity,
                    letter.record.key,
                    letter.attempts,
                    letter.last_error
                );
            }
            settled += dead.len();
        }

        Ok(settled)
    }

    /// Resolve each entity type in the batch to its index configuration once.
    fn resolve_configs<'a>(
        &self,
        batch: &'a [QueueRecord],
    ) -> AHashMap<&'a str, Option<IndexConfiguration>> {
        let mut configs: AHashMap<&str, Option<IndexConfiguration>> = AHashMap::new();
        for record in batch {
            configs
                .entry(record.entity.as_str())
                .or_insert_with(|| self.resolver.configuration_for(&record.entity));
        }
        configs
    }

    /// Load the source documents for the batch's upserts, one primary-store
    /// call per entity type.
    fn load_upsert_documents(
        &self,
        batch: &[QueueRecord],
        configs: &AHashMap<&str, Option<IndexConfiguration>>,
    ) -> Result<AHashMap<String, AHashMap<String, Value>>> {
        let mut wanted: AHashMap<&str, Vec<String>> = AHashMap::new();
        for record in batch {
            if record.kind == ChangeKind::Upsert
                && configs.get(record.entity.as_str()).is_some_and(Option::is_some)
            {
                let keys = wanted.entry(record.entity.as_str()).or_default();
                if !keys.contains(&record.key) {
                    keys.push(record.key.clone());
                }
            }
        }

        let mut documents: AHashMap<String, AHashMap<String, Value>> = AHashMap::new();
        for (entity, keys) in wanted {
            let rows = self.store.load_by_keys(entity, &keys)?;
            let docs = documents.entry(entity.to_string()).or_default();
            for row in rows {
                docs.insert(row.key, row.document);
            }
        }
        Ok(documents)
    }
}
