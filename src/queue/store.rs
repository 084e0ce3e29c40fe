//! Change-queue store abstraction and common types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::queue::record::QueueRecord;

/// A queue record that exhausted its retry budget.
///
/// Dead letters are kept by the store for inspection and can be driven back
/// into the live queue with [`ChangeQueueStore::requeue_dead_letters`]; they
/// are never silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// The original queue record.
    pub record: QueueRecord,

    /// Number of failed delivery attempts.
    pub attempts: u32,

    /// Engine error reported on the last attempt.
    pub last_error: String,
}

/// A per-record delivery failure reported by the indexer.
#[derive(Debug, Clone)]
pub struct QueueFailure {
    /// Id of the failed queue record.
    pub id: Uuid,

    /// Engine error for this record.
    pub error: String,
}

/// Counters describing the current state of a queue store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Number of live (pending) records.
    pub pending: usize,

    /// Number of dead-lettered records.
    pub dead: usize,
}

/// A durable, ordered store of pending change records.
///
/// Records are consumed oldest-first (`created_at` ascending, ties broken by
/// append order), which keeps operations on the same key in causal order.
///
/// Implementations must make each method atomic with respect to the others:
/// a `peek_oldest` followed by a `remove` of exactly those ids must neither
/// observe nor lose records appended concurrently, and a half-written append
/// must never become visible. Mutual exclusion between whole drain cycles is
/// the caller's concern (see `BatchIndexer`); exclusion between processes
/// sharing one store is the deployment's concern.
pub trait ChangeQueueStore: Send + Sync + std::fmt::Debug {
    /// Append records to the queue as one atomic operation.
    ///
    /// Either all records become durably visible or none do.
    fn append(&self, records: Vec<QueueRecord>) -> Result<()>;

    /// Read up to `limit` oldest records without removing them.
    fn peek_oldest(&self, limit: usize) -> Result<Vec<QueueRecord>>;

    /// Remove the records with the given ids.
    ///
    /// Unknown ids are ignored. Returns the number of records removed.
    fn remove(&self, ids: &[Uuid]) -> Result<usize>;

    /// Record delivery failures for the given records.
    ///
    /// Each failure bumps the record's attempt count; records that reach the
    /// store's retry ceiling are moved to the dead-letter area and returned.
    /// Records not moved stay in the live queue and will be retried.
    fn record_failures(&self, failures: &[QueueFailure]) -> Result<Vec<DeadLetter>>;

    /// All dead-lettered records, oldest first.
    fn dead_letters(&self) -> Result<Vec<DeadLetter>>;

    /// Move every dead letter back into the live queue.
    ///
    /// Attempt counts are reset. Returns the number of records requeued.
    fn requeue_dead_letters(&self) -> Result<usize>;

    /// Number of live records in the queue.
    fn len(&self) -> Result<usize>;

    /// Whether the live queue is empty.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Live and dead-letter counters.
    fn stats(&self) -> Result<QueueStats>;

    /// Remove all records (live and dead) for one entity type.
    ///
    /// Returns the number of records removed.
    fn purge_entity(&self, entity: &str) -> Result<usize>;

    /// Remove all records, live and dead.
    ///
    /// Returns the number of records removed.
    fn purge_all(&self) -> Result<usize>;
}
