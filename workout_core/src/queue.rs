//! Durable queue of "physical measurement changed" events.
//!
//! The profile side publishes events by appending JSON lines under an
//! exclusive file lock. The synchronizer claims the live file as a batch,
//! commits its events, and only then marks the batch processed. A crash in
//! between leaves the batch to be claimed again, so delivery is
//! at-least-once; duplicates are filtered by each event's revision id.

use crate::Result;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A profile's height and/or weight changed
///
/// `revision_id` identifies the profile update and is the idempotency key:
/// replaying the same revision must not produce new metrics.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MeasurementChanged {
    pub revision_id: Uuid,
    pub user_id: Uuid,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub occurred_at: DateTime<Utc>,
}

impl MeasurementChanged {
    pub fn new(
        user_id: Uuid,
        height_cm: Option<f64>,
        weight_kg: Option<f64>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            revision_id: Uuid::new_v4(),
            user_id,
            height_cm,
            weight_kg,
            occurred_at,
        }
    }
}

/// Sink for measurement events
pub trait EventSink {
    fn publish(&mut self, event: &MeasurementChanged) -> Result<()>;
}

/// JSONL-backed queue with file locking
///
/// Publishing and claiming both hold an exclusive lock on a sidecar
/// `.lock` file, so an event is either in the live queue file or in a
/// claimed batch, never lost between the two.
pub struct JsonlQueue {
    path: PathBuf,
}

impl JsonlQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn lock_file(&self, extension: &str) -> Result<File> {
        self.ensure_parent_dir()?;
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.path.with_extension(extension))?;
        lock.lock_exclusive()?;
        Ok(lock)
    }

    fn lock(&self) -> Result<File> {
        self.lock_file("lock")
    }

    /// Serialize drains of this queue
    ///
    /// Held for a whole claim → commit → mark cycle so two drains never work
    /// on the same batch. Separate from the publish lock, so publishers are
    /// not held up by a slow drain. Released when the guard is dropped.
    pub fn lock_drain(&self) -> Result<DrainGuard> {
        let file = self.lock_file("drain.lock")?;
        tracing::debug!("Acquired drain lock for {:?}", self.path);
        Ok(DrainGuard { file })
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Move the live queue aside as a batch and list every unfinished batch
    ///
    /// Batches left over from an interrupted drain are returned too, oldest
    /// first. Each batch must be passed to [`mark_processed`] once its
    /// events are committed.
    pub fn claim(&self) -> Result<Vec<PathBuf>> {
        let lock = self.lock()?;
        let claimed = if self.path.exists() && std::fs::metadata(&self.path)?.len() > 0 {
            let batch = self.path.with_file_name(format!(
                "{}.{}.{}",
                self.file_name(),
                Utc::now().format("%Y%m%dT%H%M%S%.9f"),
                DRAINING
            ));
            std::fs::rename(&self.path, &batch)?;
            Some(batch)
        } else {
            None
        };
        lock.unlock()?;

        if let Some(batch) = &claimed {
            tracing::debug!("Claimed queue batch {:?}", batch);
        }

        let prefix = format!("{}.", self.file_name());
        let suffix = format!(".{}", DRAINING);
        let mut batches = Vec::new();
        if let Some(dir) = self.path.parent() {
            if dir.exists() {
                for entry in std::fs::read_dir(dir)? {
                    let path = entry?.path();
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    if name.starts_with(&prefix) && name.ends_with(&suffix) {
                        batches.push(path);
                    }
                }
            }
        }
        batches.sort();
        Ok(batches)
    }
}

/// Exclusive right to drain a queue, see [`JsonlQueue::lock_drain`]
#[derive(Debug)]
pub struct DrainGuard {
    file: File,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release drain lock: {}", e);
        }
    }
}

impl EventSink for JsonlQueue {
    fn publish(&mut self, event: &MeasurementChanged) -> Result<()> {
        let lock = self.lock()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(event)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;

        lock.unlock()?;

        tracing::debug!("Queued measurement revision {}", event.revision_id);
        Ok(())
    }
}

const DRAINING: &str = "draining";
const PROCESSED: &str = "processed";

/// Read all events from a queue file or batch
///
/// Lines that fail to parse (for example a torn write) are skipped with a
/// warning rather than failing the whole read.
pub fn read_events(path: &Path) -> Result<Vec<MeasurementChanged>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut events = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<MeasurementChanged>(&line) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!("Failed to parse event at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} events from {:?}", events.len(), path);
    Ok(events)
}

/// Rename a committed batch from `.draining` to `.processed`
///
/// Batches are kept rather than deleted so they can be inspected or
/// replayed by hand; replays are harmless. A batch that is already gone was
/// archived by another drain and counts as processed.
pub fn mark_processed(batch: &Path) -> Result<PathBuf> {
    let processed = batch.with_extension(PROCESSED);
    match std::fs::rename(batch, &processed) {
        Ok(()) => tracing::info!("Archived queue batch to {:?}", processed),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("Queue batch {:?} already archived", batch);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(processed)
}

/// Remove all `.processed` batches in `dir`
pub fn cleanup_processed_queues(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().is_some_and(|ext| ext == PROCESSED) {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed batch: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed queue batches", count);
    }

    Ok(count)
}
