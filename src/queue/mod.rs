//! Durable, ordered storage for pending index changes.

pub mod file;
pub mod memory;
pub mod record;
pub mod store;

pub use file::{FileQueueStore, FileQueueStoreConfig};
pub use memory::{MemoryQueueStore, MemoryQueueStoreConfig};
pub use record::{ChangeKind, QueueRecord};
pub use store::{ChangeQueueStore, DeadLetter, QueueFailure, QueueStats};
