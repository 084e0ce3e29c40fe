//! Full-table reindexing through the change queue.

pub mod driver;

pub use driver::ReindexDriver;
