//! In-memory change-queue store.
//!
//! Useful for tests and for embedding the pipeline in a process that does not
//! need the queue to survive restarts. For a durable queue use
//! [`FileQueueStore`](crate::queue::file::FileQueueStore).

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::queue::record::QueueRecord;
use crate::queue::store::{ChangeQueueStore, DeadLetter, QueueFailure, QueueStats};

/// Configuration for the in-memory queue store.
#[derive(Debug, Clone)]
pub struct MemoryQueueStoreConfig {
    /// Delivery attempts before a record is dead-lettered.
    pub max_attempts: u32,
}

impl Default for MemoryQueueStoreConfig {
    fn default() -> Self {
        MemoryQueueStoreConfig { max_attempts: 5 }
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// Live records in append order.
    live: Vec<QueueRecord>,
    /// Delivery attempts per live record id.
    attempts: AHashMap<Uuid, u32>,
    /// Dead-lettered records, oldest first.
    dead: Vec<DeadLetter>,
}

/// An in-memory implementation of [`ChangeQueueStore`].
#[derive(Debug)]
pub struct MemoryQueueStore {
    config: MemoryQueueStoreConfig,
    inner: Mutex<Inner>,
}

impl MemoryQueueStore {
    /// Create a new empty in-memory queue store.
    pub fn new(config: MemoryQueueStoreConfig) -> Self {
        MemoryQueueStore {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        MemoryQueueStore::new(MemoryQueueStoreConfig::default())
    }
}

impl ChangeQueueStore for MemoryQueueStore {
    fn append(&self, records: Vec<QueueRecord>) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.live.extend(records);
        Ok(())
    }

    fn peek_oldest(&self, limit: usize) -> Result<Vec<QueueRecord>> {
        let inner = self.inner.lock();
        let mut records: Vec<QueueRecord> = inner.live.clone();
        // Stable sort: append order breaks created_at ties.
        records.sort_by_key(|r| r.created_at);
        records.truncate(limit);
        Ok(records)
    }

    fn remove(&self, ids: &[Uuid]) -> Result<usize> {
        let ids: AHashSet<Uuid> = ids.iter().copied().collect();
        let mut inner = self.inner.lock();
        let before = inner.live.len();
        inner.live.retain(|r| !ids.contains(&r.id));
        for id in &ids {
            inner.attempts.remove(id);
        }
        Ok(before - inner.live.len())
    }

    fn record_failures(&self, failures: &[QueueFailure]) -> Result<Vec<DeadLetter>> {
        let max_attempts = self.config.max_attempts;
        let mut inner = self.inner.lock();
        let mut dead_lettered = Vec::new();

        for failure in failures {
            let Some(position) = inner.live.iter().position(|r| r.id == failure.id) else {
                continue;
            };

            let attempts = inner.attempts.entry(failure.id).or_insert(0);
            *attempts += 1;
            let attempts = *attempts;

            if attempts >= max_attempts {
                let record = inner.live.remove(position);
                inner.attempts.remove(&failure.id);
                let letter = DeadLetter {
                    record,
                    attempts,
                    last_error: failure.error.clone(),
                };
                inner.dead.push(letter.clone());
                dead_lettered.push(letter);
            }
        }

        Ok(dead_lettered)
    }

    fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        Ok(self.inner.lock().dead.clone())
    }

    fn requeue_dead_letters(&self) -> Result<usize> {
        let mut inner = self.inner.lock();
        let dead = std::mem::take(&mut inner.dead);
        let count = dead.len();
        inner.live.extend(dead.into_iter().map(|d| d.record));
        Ok(count)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.inner.lock().live.len())
    }

    fn stats(&self) -> Result<QueueStats> {
        let inner = self.inner.lock();
        Ok(QueueStats {
            pending: inner.live.len(),
            dead: inner.dead.len(),
        })
    }

    fn purge_entity(&self, entity: &str) -> Result<usize> {
        let mut inner = self.inner.lock();
        let before = inner.live.len() + inner.dead.len();
        let removed_ids: Vec<Uuid> = inner
            .live
            .iter()
            .filter(|r| r.entity == entity)
            .map(|r| r.id)
            .collect();
        inner.live.retain(|r| r.entity != entity);
        inner.dead.retain(|d| d.record.entity != entity);
        for id in removed_ids {
            inner.attempts.remove(&id);
        }
        Ok(before - (inner.live.len() + inner.dead.len()))
    }

    fn purge_all(&self) -> Result<usize> {
        let mut inner = self.inner.lock();
        let count = inner.live.len() + inner.dead.len();
        inner.live.clear();
        inner.dead.clear();
        inner.attempts.clear();
        Ok(count)
    }
}
