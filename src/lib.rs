//! # Javelin
//!
//! Keeps full-text search indices in sync with a primary data store.
//!
//! ## Features
//!
//! - Durable change queue with at-least-once delivery
//! - Batch-draining indexer with per-item retry and dead-lettering
//! - Index lifecycle management with structural drift detection
//! - Full-table reindexing through the same queue pipeline
//! - Pluggable primary-store and search-engine backends

pub mod cli;
pub mod engine;
pub mod enqueue;
pub mod error;
pub mod indexer;
pub mod lifecycle;
pub mod queue;
pub mod reindex;
pub mod store;
pub mod worker;

pub mod prelude {
    //! Commonly used types.

    pub use crate::engine::{IndexConfiguration, SearchEngine};
    pub use crate::enqueue::Enqueuer;
    pub use crate::error::{JavelinError, Result};
    pub use crate::indexer::BatchIndexer;
    pub use crate::lifecycle::IndexLifecycleManager;
    pub use crate::queue::{ChangeKind, ChangeQueueStore, QueueRecord};
    pub use crate::reindex::ReindexDriver;
    pub use crate::store::PrimaryStore;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
