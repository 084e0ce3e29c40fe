//! Background drain worker.
//!
//! Runs [`BatchIndexer::process_queue`] on a dedicated thread: drains while
//! work is available, sleeps for a poll interval when the queue is empty,
//! and backs off exponentially (with jitter) after errors. The shutdown
//! signal is checked only between drain cycles, never mid-batch, so stopping
//! the worker cannot leave a bulk call half-accounted.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use log::{debug, error, warn};
use rand::Rng;

use crate::indexer::BatchIndexer;

/// Configuration for the drain worker.
#[derive(Debug, Clone)]
pub struct DrainWorkerConfig {
    /// Batch size for each drain cycle.
    pub batch_size: usize,

    /// Record ceiling per drain cycle; `0` drains until the queue is empty.
    pub max_per_cycle: usize,

    /// Sleep between cycles while the queue is empty.
    pub poll_interval: Duration,

    /// First backoff delay after an error.
    pub initial_backoff: Duration,

    /// Backoff ceiling.
    pub max_backoff: Duration,
}

impl Default for DrainWorkerConfig {
    fn default() -> Self {
        DrainWorkerConfig {
            batch_size: 100,
            max_per_cycle: 1000,
            poll_interval: Duration::from_secs(1),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// A background thread draining the change queue.
#[derive(Debug)]
pub struct DrainWorker {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl DrainWorker {
    /// Spawn the worker thread.
    pub fn spawn(indexer: Arc<BatchIndexer>, config: DrainWorkerConfig) -> crate::error::Result<Self> {
        let (shutdown, signal) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("javelin-drain".to_string())
            .spawn(move || {
                let mut backoff = config.initial_backoff;
                loop {
                    let wait = match indexer
                        .process_queue(config.batch_size, config.max_per_cycle)
                    {
                        Ok(0) => {
                            backoff = config.initial_backoff;
                            config.poll_interval
                        }
                        Ok(processed) => {
                            debug!("drain cycle processed {processed} record(s)");
                            backoff = config.initial_backoff;
                            Duration::ZERO
                        }
                        Err(e) => {
                            error!("drain cycle failed: {e}");
                            let delay = jitter(backoff);
                            backoff = backoff.saturating_mul(2).min(config.max_backoff);
                            delay
                        }
                    };

                    match signal.recv_timeout(wait) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                }
            })?;

        Ok(DrainWorker { shutdown, handle })
    }

    /// Signal the worker and wait for it to finish its current cycle.
    pub fn stop(self) {
        // The worker may already have exited on a disconnected channel.
        let _ = self.shutdown.send(());
        if self.handle.join().is_err() {
            warn!("drain worker thread panicked");
        }
    }
}

/// Add up to 25% random jitter so restarting workers do not retry in step.
fn jitter(backoff: Duration) -> Duration {
    let spread = backoff.as_millis() as u64 / 4;
    if spread == 0 {
        return backoff;
    }
    backoff + Duration::from_millis(rand::rng().random_range(0..=spread))
}
