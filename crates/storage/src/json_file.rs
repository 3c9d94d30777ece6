use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use progress_core::model::{PendingRecord, SnapshotRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::repository::{SnapshotStore, Storage, StorageError};

/// File name of the snapshot inside the application's data directory.
pub const SNAPSHOT_FILE_NAME: &str = "progress.json";

/// File name of the pending list, kept next to the snapshot.
pub const PENDING_FILE_NAME: &str = "progress.pending.json";

/// Snapshot kept as a pretty-printed JSON array on disk, with the pending
/// list in a sibling file.
#[derive(Clone, Debug)]
pub struct JsonFileSnapshotStore {
    path: PathBuf,
    pending_path: PathBuf,
}

impl JsonFileSnapshotStore {
    /// Store at the well-known locations inside `data_dir`.
    #[must_use]
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            path: dir.join(SNAPSHOT_FILE_NAME),
            pending_path: dir.join(PENDING_FILE_NAME),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn pending_path(&self) -> &Path {
        &self.pending_path
    }
}

fn io_err(path: &Path, e: &std::io::Error) -> StorageError {
    StorageError::Io(format!("{}: {e}", path.display()))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

async fn write_json<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StorageError> {
    let bytes =
        serde_json::to_vec_pretty(records).map_err(|e| StorageError::Serialization(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, &e))?;
    }

    // Write then rename so a crash never leaves a half-written file.
    let temp = temp_path(path);
    tokio::fs::write(&temp, &bytes)
        .await
        .map_err(|e| io_err(&temp, &e))?;
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| io_err(path, &e))?;

    debug!(path = %path.display(), records = records.len(), "wrote progress file");
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no progress file yet");
            return Ok(Vec::new());
        }
        Err(e) => return Err(io_err(path, &e)),
    };

    serde_json::from_slice(&bytes)
        .map_err(|e| StorageError::Serialization(format!("{}: {e}", path.display())))
}

#[async_trait]
impl SnapshotStore for JsonFileSnapshotStore {
    async fn write_snapshot(&self, records: &[SnapshotRecord]) -> Result<(), StorageError> {
        write_json(&self.path, records).await
    }

    async fn read_snapshot(&self) -> Result<Vec<SnapshotRecord>, StorageError> {
        read_json(&self.path).await
    }

    async fn write_pending(&self, records: &[PendingRecord]) -> Result<(), StorageError> {
        write_json(&self.pending_path, records).await
    }

    async fn read_pending(&self) -> Result<Vec<PendingRecord>, StorageError> {
        read_json(&self.pending_path).await
    }
}

impl Storage {
    /// Build a `Storage` that keeps the snapshot as JSON in `data_dir`.
    #[must_use]
    pub fn json_file(data_dir: impl AsRef<Path>) -> Self {
        let snapshots: Arc<dyn SnapshotStore> = Arc::new(JsonFileSnapshotStore::in_dir(data_dir));
        Self { snapshots }
    }
}
