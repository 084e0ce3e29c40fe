//! Durable file-backed change-queue store.
//!
//! The store is an append-only log. Every operation is written as one framed
//! entry: a little-endian `u32` payload length, a `u32` CRC32 of the payload,
//! then the bincode-encoded payload. A multi-record append is a single frame,
//! so an enqueue call is durably all-or-nothing. On open the log is replayed;
//! a torn trailing frame (crash mid-write) is detected by the length/checksum
//! and truncated away.
//!
//! Obsolete frames accumulate as records are removed. When their share passes
//! a configured ratio the log is compacted: the current state is written to a
//! fresh file as one snapshot frame which atomically replaces the log.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{JavelinError, Result};
use crate::queue::record::QueueRecord;
use crate::queue::store::{ChangeQueueStore, DeadLetter, QueueFailure, QueueStats};

/// Frame header size: payload length + checksum.
const FRAME_HEADER_LEN: usize = 8;

/// Upper bound on a single frame payload. A frame larger than this on disk is
/// treated as corruption, not as a real entry.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Configuration for the file-backed queue store.
#[derive(Debug, Clone)]
pub struct FileQueueStoreConfig {
    /// Sync every write to disk before acknowledging it.
    pub sync_writes: bool,

    /// Delivery attempts before a record is dead-lettered.
    pub max_attempts: u32,

    /// Minimum number of log frames before compaction is considered.
    pub compact_min_frames: usize,

    /// Obsolete-frame ratio that triggers compaction.
    pub compact_dead_ratio: f64,
}

impl Default for FileQueueStoreConfig {
    fn default() -> Self {
        FileQueueStoreConfig {
            sync_writes: true,
            max_attempts: 5,
            compact_min_frames: 1024,
            compact_dead_ratio: 0.5,
        }
    }
}

/// A live record together with its delivery attempt count.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AttemptedRecord {
    record: QueueRecord,
    attempts: u32,
}

/// One logical operation in the queue log.
#[derive(Debug, Serialize, Deserialize)]
enum LogEntry {
    /// Records appended by one enqueue call.
    Append(Vec<QueueRecord>),
    /// Records removed after successful delivery.
    Remove(Vec<Uuid>),
    /// A delivery failure for a record that stays queued.
    Failure { id: Uuid, error: String },
    /// A record moved to the dead-letter area.
    DeadLettered(DeadLetter),
    /// All dead letters moved back into the live queue.
    RequeueDead,
    /// All records of one entity removed.
    PurgeEntity(String),
    /// All records removed.
    PurgeAll,
    /// Full state written by compaction; resets replay state.
    Snapshot {
        live: Vec<AttemptedRecord>,
        dead: Vec<DeadLetter>,
    },
}

#[derive(Debug, Default)]
struct QueueState {
    live: Vec<QueueRecord>,
    attempts: AHashMap<Uuid, u32>,
    dead: Vec<DeadLetter>,
}

impl QueueState {
    fn apply(&mut self, entry: LogEntry) {
        match entry {
            LogEntry::Append(records) => self.live.extend(records),
            LogEntry::Remove(ids) => {
                let ids: AHashSet<Uuid> = ids.into_iter().collect();
                self.live.retain(|r| !ids.contains(&r.id));
                for id in &ids {
                    self.attempts.remove(id);
                }
            }
            LogEntry::Failure { id, .. } => {
                if self.live.iter().any(|r| r.id == id) {
                    *self.attempts.entry(id).or_insert(0) += 1;
                }
            }
            LogEntry::DeadLettered(letter) => {
                let id = letter.record.id;
                self.live.retain(|r| r.id != id);
                self.attempts.remove(&id);
                self.dead.push(letter);
            }
            LogEntry::RequeueDead => {
                let dead = std::mem::take(&mut self.dead);
                self.live.extend(dead.into_iter().map(|d| d.record));
            }
            LogEntry::PurgeEntity(entity) => {
                let removed: Vec<Uuid> = self
                    .live
                    .iter()
                    .filter(|r| r.entity == entity)
                    .map(|r| r.id)
                    .collect();
                self.live.retain(|r| r.entity != entity);
                self.dead.retain(|d| d.record.entity != entity);
                for id in removed {
                    self.attempts.remove(&id);
                }
            }
            LogEntry::PurgeAll => {
                self.live.clear();
                self.attempts.clear();
                self.dead.clear();
            }
            LogEntry::Snapshot { live, dead } => {
                self.live.clear();
                self.attempts.clear();
                for entry in live {
                    if entry.attempts > 0 {
                        self.attempts.insert(entry.record.id, entry.attempts);
                    }
                    self.live.push(entry.record);
                }
                self.dead = dead;
            }
        }
    }

    /// Frames a fully compacted log would need: one snapshot.
    fn useful_frames(&self) -> usize {
        1
    }
}

#[derive(Debug)]
struct Inner {
    file: File,
    frames: usize,
    state: QueueState,
}

/// A durable, file-backed implementation of [`ChangeQueueStore`].
#[derive(Debug)]
pub struct FileQueueStore {
    path: PathBuf,
    config: FileQueueStoreConfig,
    inner: Mutex<Inner>,
}

impl FileQueueStore {
    /// Open the queue log at `path`, creating it if absent.
    ///
    /// Existing frames are replayed to rebuild the queue state. A torn
    /// trailing frame is logged and truncated away.
    pub fn open<P: AsRef<Path>>(path: P, config: FileQueueStoreConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut state = QueueState::default();
        let mut frames = 0;
        let mut valid_len = 0u64;

        if path.exists() {
            let mut bytes = Vec::new();
            File::open(&path)?.read_to_end(&mut bytes)?;
            let mut offset = 0usize;

            loop {
                let remaining = bytes.len() - offset;
                if remaining == 0 {
                    break;
                }
                if remaining < FRAME_HEADER_LEN {
                    warn!(
                        "queue log {}: truncating torn frame header at offset {offset}",
                        path.display()
                    );
                    break;
                }
                let len = LittleEndian::read_u32(&bytes[offset..offset + 4]);
                let crc = LittleEndian::read_u32(&bytes[offset + 4..offset + 8]);
                if len > MAX_FRAME_LEN || remaining - FRAME_HEADER_LEN < len as usize {
                    warn!(
                        "queue log {}: truncating torn frame at offset {offset}",
                        path.display()
                    );
                    break;
                }
                let start = offset + FRAME_HEADER_LEN;
                let payload = &bytes[start..start + len as usize];
                if crc32fast::hash(payload) != crc {
                    warn!(
                        "queue log {}: truncating frame with bad checksum at offset {offset}",
                        path.display()
                    );
                    break;
                }

                let entry: LogEntry = bincode::deserialize(payload).map_err(|e| {
                    JavelinError::queue(format!(
                        "queue log {}: undecodable frame at offset {offset}: {e}",
                        path.display()
                    ))
                })?;
                state.apply(entry);
                frames += 1;
                offset = start + len as usize;
                valid_len = offset as u64;
            }

            if (valid_len as usize) < bytes.len() {
                let file = OpenOptions::new().write(true).open(&path)?;
                file.set_len(valid_len)?;
                file.sync_data()?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(
            "opened queue log {} ({} frames, {} live, {} dead)",
            path.display(),
            frames,
            state.live.len(),
            state.dead.len()
        );

        Ok(FileQueueStore {
            path,
            config,
            inner: Mutex::new(Inner {
                file,
                frames,
                state,
            }),
        })
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the log as a single snapshot of the current state.
    pub fn compact(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.compact_locked(&mut inner)
    }

    fn encode_frame(entry: &LogEntry) -> Result<Vec<u8>> {
        let payload = bincode::serialize(entry)?;
        if payload.len() as u64 > MAX_FRAME_LEN as u64 {
            return Err(JavelinError::queue("queue log frame too large"));
        }
        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    fn write_entry(&self, inner: &mut Inner, entry: &LogEntry) -> Result<()> {
        let frame = Self::encode_frame(entry)?;
        inner.file.write_all(&frame)?;
        if self.config.sync_writes {
            inner.file.sync_data()?;
        }
        inner.frames += 1;
        Ok(())
    }

    fn maybe_compact(&self, inner: &mut Inner) -> Result<()> {
        if inner.frames < self.config.compact_min_frames {
            return Ok(());
        }
        let obsolete = inner.frames.saturating_sub(inner.state.useful_frames());
        if (obsolete as f64) / (inner.frames as f64) > self.config.compact_dead_ratio {
            self.compact_locked(inner)?;
        }
        Ok(())
    }

    fn compact_locked(&self, inner: &mut Inner) -> Result<()> {
        let snapshot = LogEntry::Snapshot {
            live: inner
                .state
                .live
                .iter()
                .map(|record| AttemptedRecord {
                    record: record.clone(),
                    attempts: inner.state.attempts.get(&record.id).copied().unwrap_or(0),
                })
                .collect(),
            dead: inner.state.dead.clone(),
        };
        let frame = Self::encode_frame(&snapshot)?;

        let tmp_path = self.path.with_extension("compact");
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(&frame)?;
        tmp.sync_data()?;
        drop(tmp);

        std::fs::rename(&tmp_path, &self.path)?;
        inner.file = OpenOptions::new().append(true).open(&self.path)?;
        let old_frames = inner.frames;
        inner.frames = 1;
        debug!(
            "compacted queue log {} ({old_frames} frames -> 1)",
            self.path.display()
        );
        Ok(())
    }
}

impl ChangeQueueStore for FileQueueStore {
    fn append(&self, records: Vec<QueueRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        self.write_entry(&mut inner, &LogEntry::Append(records.clone()))?;
        inner.state.live.extend(records);
        Ok(())
    }

    fn peek_oldest(&self, limit: usize) -> Result<Vec<QueueRecord>> {
        let inner = self.inner.lock();
        let mut records = inner.state.live.clone();
        // Stable sort: append order breaks created_at ties.
        records.sort_by_key(|r| r.created_at);
        records.truncate(limit);
        Ok(records)
    }

    fn remove(&self, ids: &[Uuid]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut inner = self.inner.lock();
        let known: Vec<Uuid> = {
            let ids: AHashSet<Uuid> = ids.iter().copied().collect();
            inner
                .state
                .live
                .iter()
                .filter(|r| ids.contains(&r.id))
                .map(|r| r.id)
                .collect()
        };
        if known.is_empty() {
            return Ok(0);
        }
        self.write_entry(&mut inner, &LogEntry::Remove(known.clone()))?;
        inner.state.apply(LogEntry::Remove(known.clone()));
        self.maybe_compact(&mut inner)?;
        Ok(known.len())
    }

    fn record_failures(&self, failures: &[QueueFailure]) -> Result<Vec<DeadLetter>> {
        let mut inner = self.inner.lock();
        let mut dead_lettered = Vec::new();

        for failure in failures {
            let Some(record) = inner
                .state
                .live
                .iter()
                .find(|r| r.id == failure.id)
                .cloned()
            else {
                continue;
            };

            let attempts = inner.state.attempts.get(&failure.id).copied().unwrap_or(0) + 1;
            if attempts >= self.config.max_attempts {
                let letter = DeadLetter {
                    record,
                    attempts,
                    last_error: failure.error.clone(),
                };
                self.write_entry(&mut inner, &LogEntry::DeadLettered(letter.clone()))?;
                inner.state.apply(LogEntry::DeadLettered(letter.clone()));
                dead_lettered.push(letter);
            } else {
                let entry = LogEntry::Failure {
                    id: failure.id,
                    error: failure.error.clone(),
                };
                self.write_entry(&mut inner, &entry)?;
                inner.state.apply(entry);
            }
        }

        self.maybe_compact(&mut inner)?;
        Ok(dead_lettered)
    }

    fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        Ok(self.inner.lock().state.dead.clone())
    }

    fn requeue_dead_letters(&self) -> Result<usize> {
        let mut inner = self.inner.lock();
        let count = inner.state.dead.len();
        if count == 0 {
            return Ok(0);
        }
        self.write_entry(&mut inner, &LogEntry::RequeueDead)?;
        inner.state.apply(LogEntry::RequeueDead);
        Ok(count)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.inner.lock().state.live.len())
    }

    fn stats(&self) -> Result<QueueStats> {
        let inner = self.inner.lock();
        Ok(QueueStats {
            pending: inner.state.live.len(),
            dead: inner.state.dead.len(),
        })
    }

    fn purge_entity(&self, entity: &str) -> Result<usize> {
        let mut inner = self.inner.lock();
        let before = inner.state.live.len() + inner.state.dead.len();
        self.write_entry(&mut inner, &LogEntry::PurgeEntity(entity.to_string()))?;
        inner.state.apply(LogEntry::PurgeEntity(entity.to_string()));
        let removed = before - (inner.state.live.len() + inner.state.dead.len());
        self.maybe_compact(&mut inner)?;
        Ok(removed)
    }

    fn purge_all(&self) -> Result<usize> {
        let mut inner = self.inner.lock();
        let count = inner.state.live.len() + inner.state.dead.len();
        self.write_entry(&mut inner, &LogEntry::PurgeAll)?;
        inner.state.apply(LogEntry::PurgeAll);
        self.maybe_compact(&mut inner)?;
        Ok(count)
    }
}
