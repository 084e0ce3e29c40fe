//! Command line argument parsing for the javelin CLI using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Javelin - keeps full-text search indices in sync with a primary data store
#[derive(Parser, Debug, Clone)]
#[command(name = "javelin")]
#[command(about = "Keeps full-text search indices in sync with a primary data store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct JavelinArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl JavelinArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Drain the change queue into the search indices
    #[command(name = "process-queue")]
    ProcessQueue(ProcessQueueArgs),

    /// Re-enqueue every record of an entity type
    Reindex(ReindexArgs),

    /// Create or recreate indices to match their declared configuration
    #[command(name = "sync-indexes")]
    SyncIndexes(SyncIndexesArgs),

    /// Show queue depth, dead letters, and index document counts
    Status(StatusArgs),

    /// Remove pending records from the change queue
    #[command(name = "purge-queue")]
    PurgeQueue(PurgeQueueArgs),

    /// Move dead-lettered records back into the live queue
    #[command(name = "requeue-dead-letters")]
    RequeueDeadLetters(RequeueDeadLettersArgs),
}

/// Arguments for draining the queue
#[derive(Parser, Debug, Clone)]
pub struct ProcessQueueArgs {
    /// Path to the javelin data directory
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Index declarations file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config_file: PathBuf,

    /// Batch size for each drain cycle
    #[arg(short, long, default_value = "100")]
    pub batch_size: usize,

    /// Stop after this many records (0 = drain until empty)
    #[arg(short, long, default_value = "0")]
    pub max_processed: usize,
}

/// Arguments for reindexing an entity type
#[derive(Parser, Debug, Clone)]
pub struct ReindexArgs {
    /// Path to the javelin data directory
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Entity type to reindex
    #[arg(short, long)]
    pub entity: String,

    /// Page size for the primary-key scan
    #[arg(short, long, default_value = "100")]
    pub batch_size: usize,
}

/// Arguments for synchronizing index configurations
#[derive(Parser, Debug, Clone)]
pub struct SyncIndexesArgs {
    /// Path to the javelin data directory
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Index declarations file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config_file: PathBuf,
}

/// Arguments for the status report
#[derive(Parser, Debug, Clone)]
pub struct StatusArgs {
    /// Path to the javelin data directory
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,
}

/// Arguments for purging the queue
#[derive(Parser, Debug, Clone)]
pub struct PurgeQueueArgs {
    /// Path to the javelin data directory
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,

    /// Only purge records of this entity type
    #[arg(short, long)]
    pub entity: Option<String>,
}

/// Arguments for requeueing dead letters
#[derive(Parser, Debug, Clone)]
pub struct RequeueDeadLettersArgs {
    /// Path to the javelin data directory
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: PathBuf,
}
