//! Index lifecycle: creation, drift detection, and recreation.

pub mod manager;

pub use manager::{IndexLifecycleManager, SyncOutcome, SyncReport, SyncStatus};
