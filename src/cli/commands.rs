//! Command execution for the javelin CLI.
//!
//! The CLI wires the pipeline over a single data directory:
//!
//! ```text
//! <data-dir>/queue.log    change queue (file-backed log)
//! <data-dir>/records/     primary records, one <entity>/<key>.json each
//! <data-dir>/indices/     search indices (directory engine)
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::cli::args::*;
use crate::engine::directory::DirectoryEngine;
use crate::engine::resolver::StaticConfigResolver;
use crate::enqueue::Enqueuer;
use crate::error::{JavelinError, Result};
use crate::indexer::BatchIndexer;
use crate::lifecycle::manager::{IndexLifecycleManager, SyncOutcome, SyncStatus};
use crate::queue::file::{FileQueueStore, FileQueueStoreConfig};
use crate::queue::store::ChangeQueueStore;
use crate::reindex::ReindexDriver;
use crate::store::DirectoryPrimaryStore;

/// Execute the parsed CLI command.
pub fn execute_command(args: JavelinArgs) -> Result<()> {
    match args.command {
        Command::ProcessQueue(args) => process_queue(args),
        Command::Reindex(args) => reindex(args),
        Command::SyncIndexes(args) => sync_indexes(args),
        Command::Status(args) => status(args),
        Command::PurgeQueue(args) => purge_queue(args),
        Command::RequeueDeadLetters(args) => requeue_dead_letters(args),
    }
}

fn open_queue(data_dir: &Path) -> Result<Arc<FileQueueStore>> {
    Ok(Arc::new(FileQueueStore::open(
        data_dir.join("queue.log"),
        FileQueueStoreConfig::default(),
    )?))
}

fn open_engine(data_dir: &Path) -> Result<Arc<DirectoryEngine>> {
    Ok(Arc::new(DirectoryEngine::open(data_dir.join("indices"))?))
}

fn open_store(data_dir: &Path) -> Result<Arc<DirectoryPrimaryStore>> {
    Ok(Arc::new(DirectoryPrimaryStore::open(
        data_dir.join("records"),
    )?))
}

fn process_queue(args: ProcessQueueArgs) -> Result<()> {
    let queue = open_queue(&args.data_dir)?;
    let engine = open_engine(&args.data_dir)?;
    let store = open_store(&args.data_dir)?;
    let resolver = Arc::new(StaticConfigResolver::from_file(&args.config_file)?);

    let indexer = BatchIndexer::new(queue.clone(), engine, store, resolver);
    let processed = indexer.process_queue(args.batch_size, args.max_processed)?;

    let stats = queue.stats()?;
    println!("Processed {processed} record(s)");
    println!("Queue: {} pending, {} dead-lettered", stats.pending, stats.dead);
    Ok(())
}

fn reindex(args: ReindexArgs) -> Result<()> {
    let queue = open_queue(&args.data_dir)?;
    let store = open_store(&args.data_dir)?;

    let enqueuer = Enqueuer::new(queue, store.clone());
    let driver = ReindexDriver::new(store, enqueuer);
    let enqueued = driver.enqueue_all(&args.entity, args.batch_size)?;

    println!("Enqueued {enqueued} record(s) of entity '{}'", args.entity);
    println!("Run 'javelin process-queue' to deliver them");
    Ok(())
}

fn sync_indexes(args: SyncIndexesArgs) -> Result<()> {
    let engine = open_engine(&args.data_dir)?;
    let resolver = Arc::new(StaticConfigResolver::from_file(&args.config_file)?);

    let manager = IndexLifecycleManager::new(engine, resolver);
    let report = manager.synchronize_all();

    for (index, status) in &report.entries {
        match status {
            SyncStatus::Done(SyncOutcome::Created) => println!("{index}: created"),
            SyncStatus::Done(SyncOutcome::Recreated) => println!("{index}: recreated"),
            SyncStatus::Done(SyncOutcome::Unchanged) => println!("{index}: up to date"),
            SyncStatus::Failed(error) => println!("{index}: FAILED ({error})"),
        }
    }

    if report.has_failures() {
        let failed = report.failures().count();
        return Err(JavelinError::engine(format!(
            "{failed} index(es) failed to synchronize"
        )));
    }
    Ok(())
}

fn status(args: StatusArgs) -> Result<()> {
    let queue = open_queue(&args.data_dir)?;
    let engine = open_engine(&args.data_dir)?;

    let stats = queue.stats()?;
    println!("Queue: {} pending, {} dead-lettered", stats.pending, stats.dead);

    for letter in queue.dead_letters()?.iter().take(10) {
        println!(
            "  dead: {} '{}' key '{}' after {} attempt(s): {}",
            letter.record.kind,
            letter.record.entity,
            letter.record.key,
            letter.attempts,
            letter.last_error
        );
    }

    let indices = engine.list_indices()?;
    if indices.is_empty() {
        println!("No indices");
    } else {
        println!("Indices:");
        for name in indices {
            println!("  {name}: {} document(s)", engine.doc_count(&name)?);
        }
    }
    Ok(())
}

fn purge_queue(args: PurgeQueueArgs) -> Result<()> {
    let queue = open_queue(&args.data_dir)?;
    let purged = match &args.entity {
        Some(entity) => queue.purge_entity(entity)?,
        None => queue.purge_all()?,
    };
    println!("Purged {purged} record(s)");
    Ok(())
}

fn requeue_dead_letters(args: RequeueDeadLettersArgs) -> Result<()> {
    let queue = open_queue(&args.data_dir)?;
    let requeued = queue.requeue_dead_letters()?;
    println!("Requeued {requeued} dead-lettered record(s)");
    Ok(())
}
