use async_trait::async_trait;
use progress_core::model::{PendingRecord, SnapshotRecord};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Local persistence for the completed-node snapshot and the list of nodes
/// still waiting for the remote store.
///
/// Both are always written whole and replace whatever was stored before.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot with `records`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the records cannot be serialized or written.
    async fn write_snapshot(&self, records: &[SnapshotRecord]) -> Result<(), StorageError>;

    /// Read the stored snapshot. A store that was never written reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be read or decoded.
    async fn read_snapshot(&self) -> Result<Vec<SnapshotRecord>, StorageError>;

    /// Replace the stored pending list with `records`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the records cannot be serialized or written.
    async fn write_pending(&self, records: &[PendingRecord]) -> Result<(), StorageError>;

    /// Read the stored pending list. A store that was never written reads as
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the list cannot be read or decoded.
    async fn read_pending(&self) -> Result<Vec<PendingRecord>, StorageError>;
}

/// Simple in-memory snapshot store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    records: Arc<Mutex<Vec<SnapshotRecord>>>,
    pending: Arc<Mutex<Vec<PendingRecord>>>,
}

impl InMemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn write_snapshot(&self, records: &[SnapshotRecord]) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = records.to_vec();
        Ok(())
    }

    async fn read_snapshot(&self) -> Result<Vec<SnapshotRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn write_pending(&self, records: &[PendingRecord]) -> Result<(), StorageError> {
        let mut guard = self
            .pending
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = records.to_vec();
        Ok(())
    }

    async fn read_pending(&self) -> Result<Vec<PendingRecord>, StorageError> {
        let guard = self
            .pending
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }
}

/// Handle to whichever snapshot backend the app was configured with.
#[derive(Clone)]
pub struct Storage {
    pub snapshots: Arc<dyn SnapshotStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let snapshots: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::new());
        Self { snapshots }
    }
}
