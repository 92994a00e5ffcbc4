//! Persistence port and its implementations.
//!
//! Every mutation follows the same pattern: load the full data set, apply one
//! change to one aggregate, and persist the whole thing. A transaction that
//! returns an error leaves the stored data untouched.

use crate::{Error, PlannedWorkout, Result, UserMetric, WorkoutSession};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

// ============================================================================
// Repository Port
// ============================================================================

/// Load-by-id / add / update / remove for one entity type
pub trait Repository<T> {
    fn load(&self, id: Uuid) -> Result<T>;
    fn add(&mut self, item: T) -> Result<()>;
    fn update(&mut self, item: T) -> Result<()>;
    fn remove(&mut self, id: Uuid) -> Result<T>;
    fn list(&self) -> Vec<T>;
}

/// An entity kept in [`StoreData`]
pub trait Stored: Clone + Serialize + DeserializeOwned {
    const KIND: &'static str;

    fn id(&self) -> Uuid;
    fn table(data: &StoreData) -> &BTreeMap<Uuid, Self>;
    fn table_mut(data: &mut StoreData) -> &mut BTreeMap<Uuid, Self>;
}

impl Stored for WorkoutSession {
    const KIND: &'static str = "workout session";

    fn id(&self) -> Uuid {
        WorkoutSession::id(self)
    }

    fn table(data: &StoreData) -> &BTreeMap<Uuid, Self> {
        &data.sessions
    }

    fn table_mut(data: &mut StoreData) -> &mut BTreeMap<Uuid, Self> {
        &mut data.sessions
    }
}

impl Stored for PlannedWorkout {
    const KIND: &'static str = "planned workout";

    fn id(&self) -> Uuid {
        PlannedWorkout::id(self)
    }

    fn table(data: &StoreData) -> &BTreeMap<Uuid, Self> {
        &data.planned
    }

    fn table_mut(data: &mut StoreData) -> &mut BTreeMap<Uuid, Self> {
        &mut data.planned
    }
}

impl Stored for UserMetric {
    const KIND: &'static str = "user metric";

    fn id(&self) -> Uuid {
        UserMetric::id(self)
    }

    fn table(data: &StoreData) -> &BTreeMap<Uuid, Self> {
        &data.metrics
    }

    fn table_mut(data: &mut StoreData) -> &mut BTreeMap<Uuid, Self> {
        &mut data.metrics
    }
}

// ============================================================================
// Store Data
// ============================================================================

/// Everything the tracker persists
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreData {
    #[serde(default)]
    sessions: BTreeMap<Uuid, WorkoutSession>,
    #[serde(default)]
    planned: BTreeMap<Uuid, PlannedWorkout>,
    #[serde(default)]
    metrics: BTreeMap<Uuid, UserMetric>,
    /// Revision ids of measurement events already turned into metrics
    ///
    /// Kept for the life of the store, one 16-byte id per profile update.
    /// Archived batches can be replayed at any time, so no id is ever safe
    /// to forget.
    #[serde(default)]
    applied_revisions: BTreeSet<Uuid>,
}

impl<T: Stored> Repository<T> for StoreData {
    fn load(&self, id: Uuid) -> Result<T> {
        T::table(self)
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound { kind: T::KIND, id })
    }

    fn add(&mut self, item: T) -> Result<()> {
        let id = item.id();
        let table = T::table_mut(self);
        if table.contains_key(&id) {
            return Err(Error::validation(format!("{} {} already exists", T::KIND, id)));
        }
        table.insert(id, item);
        Ok(())
    }

    fn update(&mut self, item: T) -> Result<()> {
        let id = item.id();
        match T::table_mut(self).get_mut(&id) {
            Some(existing) => {
                *existing = item;
                Ok(())
            }
            None => Err(Error::NotFound { kind: T::KIND, id }),
        }
    }

    fn remove(&mut self, id: Uuid) -> Result<T> {
        T::table_mut(self)
            .remove(&id)
            .ok_or(Error::NotFound { kind: T::KIND, id })
    }

    fn list(&self) -> Vec<T> {
        T::table(self).values().cloned().collect()
    }
}

impl StoreData {
    pub fn sessions(&self) -> impl Iterator<Item = &WorkoutSession> {
        self.sessions.values()
    }

    pub fn planned_workouts(&self) -> impl Iterator<Item = &PlannedWorkout> {
        self.planned.values()
    }

    pub fn metrics(&self) -> impl Iterator<Item = &UserMetric> {
        self.metrics.values()
    }

    /// Planned workout that spawned `session_id`, if any
    pub fn planned_for_session(&self, session_id: Uuid) -> Option<&PlannedWorkout> {
        self.planned
            .values()
            .find(|p| p.workout_session_id() == Some(session_id))
    }

    pub fn has_applied_revision(&self, revision_id: Uuid) -> bool {
        self.applied_revisions.contains(&revision_id)
    }

    pub(crate) fn mark_revision_applied(&mut self, revision_id: Uuid) {
        self.applied_revisions.insert(revision_id);
    }

    /// Check that every entity is filed under its own id
    fn check_keys(&self) -> Result<()> {
        fn check<T: Stored>(table: &BTreeMap<Uuid, T>) -> Result<()> {
            for (key, item) in table {
                if *key != item.id() {
                    return Err(Error::validation(format!(
                        "{} {} is stored under key {}",
                        T::KIND,
                        item.id(),
                        key
                    )));
                }
            }
            Ok(())
        }
        check(&self.sessions)?;
        check(&self.planned)?;
        check(&self.metrics)
    }
}

// ============================================================================
// Store Implementations
// ============================================================================

/// Transactional access to [`StoreData`]
pub trait Store {
    /// Current data, read-only
    fn snapshot(&self) -> Result<StoreData>;

    /// Apply `f` and persist the result; nothing is persisted if `f` fails
    fn transact<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut StoreData) -> Result<R>;
}

/// Store held in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    data: StoreData,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn snapshot(&self) -> Result<StoreData> {
        Ok(self.data.clone())
    }

    fn transact<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut StoreData) -> Result<R>,
    {
        let mut working = self.data.clone();
        let result = f(&mut working)?;
        self.data = working;
        Ok(result)
    }
}

/// Store persisted as one JSON document
///
/// Transactions hold an exclusive lock on a sidecar `.lock` file for the
/// whole load-modify-save cycle. Saves go through a temp file that is synced
/// and renamed over the original.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Load the document with a shared lock
    ///
    /// A missing file is an empty store. A file that fails to parse, or
    /// whose entities break their invariants, is an error: loading it as
    /// empty would discard it on the next save.
    pub fn load(path: &Path) -> Result<StoreData> {
        if !path.exists() {
            tracing::info!("No store file at {:?}, starting empty", path);
            return Ok(StoreData::default());
        }

        let file = File::open(path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        let data: StoreData = serde_json::from_str(&contents).map_err(|e| {
            tracing::error!("Store file {:?} is unreadable: {}", path, e);
            e
        })?;
        data.check_keys()?;

        tracing::debug!("Loaded store from {:?}", path);
        Ok(data)
    }

    /// Atomically replace the document with `data`
    pub fn save(path: &Path, data: &StoreData) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "store path missing parent")
        })?;
        std::fs::create_dir_all(parent)?;

        // Temp file in the same directory so the rename stays atomic
        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, data)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved store to {:?}", path);
        Ok(())
    }

    fn lock_exclusive(&self) -> Result<File> {
        self.ensure_parent_dir()?;
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;
        Ok(lock)
    }
}

impl Store for FileStore {
    fn snapshot(&self) -> Result<StoreData> {
        Self::load(&self.path)
    }

    fn transact<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut StoreData) -> Result<R>,
    {
        let lock = self.lock_exclusive()?;

        let outcome = Self::load(&self.path).and_then(|mut data| {
            let result = f(&mut data)?;
            Self::save(&self.path, &data)?;
            Ok(result)
        });

        lock.unlock()?;
        outcome
    }
}
