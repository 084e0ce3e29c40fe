//! The reindex driver.
//!
//! Rebuilding an index from scratch is a full re-enqueue: every primary key
//! of the entity type is paged out of the primary store and fed through the
//! [`Enqueuer`], so a reindex rides the exact same batching and delivery
//! guarantees as incremental updates.

use std::sync::Arc;

use log::{debug, error, info};

use crate::enqueue::Enqueuer;
use crate::error::{JavelinError, Result};
use crate::queue::record::ChangeKind;
use crate::store::PrimaryStore;

/// Feeds every record of an entity type back into the change queue.
#[derive(Debug, Clone)]
pub struct ReindexDriver {
    store: Arc<dyn PrimaryStore>,
    enqueuer: Enqueuer,
}

impl ReindexDriver {
    /// Create a driver over the primary store and an enqueuer.
    pub fn new(store: Arc<dyn PrimaryStore>, enqueuer: Enqueuer) -> Self {
        ReindexDriver { store, enqueuer }
    }

    /// Enqueue an upsert for every record of `entity`, paging primary keys
    /// in batches of `batch_size`.
    ///
    /// The scan stops after the first page smaller than `batch_size` — the
    /// final partial page is still enqueued. Returns the number of records
    /// enqueued.
    pub fn enqueue_all(&self, entity: &str, batch_size: usize) -> Result<usize> {
        if batch_size == 0 {
            error!("reindex batch size must be positive");
            return Err(JavelinError::config("reindex batch size must be positive"));
        }

        info!("reindexing entity '{entity}' in batches of {batch_size}");
        let mut offset = 0;
        let mut enqueued = 0;

        loop {
            let keys = self.store.page_keys(entity, offset, batch_size)?;
            let loaded = keys.len();
            if loaded > 0 {
                enqueued += self.enqueuer.enqueue_keys(entity, &keys, ChangeKind::Upsert)?;
                debug!("enqueued page of {loaded} key(s) at offset {offset}");
            }
            offset += loaded;
            if loaded < batch_size {
                break;
            }
        }

        info!("reindex of entity '{entity}' enqueued {enqueued} record(s)");
        Ok(enqueued)
    }
}
