//! Batch-draining the change queue into the search engine.

pub mod indexer;

pub use indexer::BatchIndexer;
