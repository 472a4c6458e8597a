//! In-memory task registry with whole-file snapshot persistence.
//!
//! All records live in one map behind a single [`tokio::sync::Mutex`]. Critical sections
//! only touch the map: snapshots clone it under the lock and then serialize and write
//! outside of it, so a slow disk never stalls pollers.
//!
//! The snapshot is written to `<file>.tmp` and renamed over the previous snapshot, so a
//! crash mid-write leaves the old file intact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::types::{TaskId, TaskRecord};

/// Shared task registry. Wrap in `Arc` to share between pollers and handlers.
pub struct TaskStore {
    tasks: Mutex<HashMap<TaskId, TaskRecord>>,
    snapshot_path: PathBuf,
    /// Serializes snapshot writers so they never share the temp file
    write_lock: Mutex<()>,
}

impl TaskStore {
    /// Create an empty store persisting to `snapshot_path`
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            snapshot_path: snapshot_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the snapshot file
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Insert a new record
    pub async fn create(&self, record: TaskRecord) -> Result<TaskId, StoreError> {
        let id = record.id;
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        tasks.insert(id, record);
        Ok(id)
    }

    /// Copy of one record
    pub async fn get(&self, id: &TaskId) -> Result<TaskRecord, StoreError> {
        self.tasks
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(*id))
    }

    /// Atomic read-modify-write of one record.
    ///
    /// The mutator runs with the lock held and must not block.
    pub async fn update<F, R>(&self, id: &TaskId, mutator: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut TaskRecord) -> R,
    {
        let mut tasks = self.tasks.lock().await;
        let record = tasks.get_mut(id).ok_or(StoreError::NotFound(*id))?;
        Ok(mutator(record))
    }

    /// Copy of every record, newest first
    pub async fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self.tasks.lock().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Number of records
    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// Drop a record. Only used by tests and tooling; the engine never deletes tasks.
    pub async fn remove(&self, id: &TaskId) -> Option<TaskRecord> {
        self.tasks.lock().await.remove(id)
    }

    /// Replace the whole map
    pub async fn replace_all(&self, records: HashMap<TaskId, TaskRecord>) {
        *self.tasks.lock().await = records;
    }

    /// Write the current records to the snapshot file.
    ///
    /// Takes a consistent copy under the lock, then writes without it. A mutation that
    /// lands after the copy is picked up by the next snapshot.
    pub async fn snapshot_to_durable_storage(&self) -> Result<usize, StoreError> {
        // Copy while holding the writer lock so files land in the order copies were taken
        let _writer = self.write_lock.lock().await;
        let copy: HashMap<TaskId, TaskRecord> = self.tasks.lock().await.clone();
        let count = copy.len();
        let content = serde_json::to_vec_pretty(&copy)?;

        write_atomically(&self.snapshot_path, &content)
            .await
            .map_err(|source| StoreError::Snapshot {
                path: self.snapshot_path.clone(),
                source,
            })?;

        tracing::trace!(path = %self.snapshot_path.display(), count, "Task snapshot written");
        Ok(count)
    }

    /// Replace the in-memory records with the snapshot file's contents.
    ///
    /// A missing or unreadable snapshot yields an empty store. Returns the number of
    /// records loaded.
    pub async fn load_from_durable_storage(&self) -> usize {
        let records = match read_snapshot(&self.snapshot_path).await {
            Ok(Some(records)) => records,
            Ok(None) => {
                tracing::info!(
                    path = %self.snapshot_path.display(),
                    "No task snapshot found, starting empty"
                );
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.snapshot_path.display(),
                    error = %e,
                    "Task snapshot unreadable, starting empty"
                );
                HashMap::new()
            }
        };

        let count = records.len();
        self.replace_all(records).await;
        tracing::info!(count, "Loaded tasks from snapshot");
        count
    }
}

async fn read_snapshot(
    path: &Path,
) -> Result<Option<HashMap<TaskId, TaskRecord>>, Box<dyn std::error::Error + Send + Sync>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let records: HashMap<TaskId, TaskRecord> = serde_json::from_slice(&bytes)?;

    // Keys are authoritative only if they agree with the embedded ids
    if let Some((key, record)) = records.iter().find(|(key, record)| **key != record.id) {
        return Err(format!("snapshot key {} holds task {}", key, record.id).into());
    }
    Ok(Some(records))
}

async fn write_atomically(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await
}
