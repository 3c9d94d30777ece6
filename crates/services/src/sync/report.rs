use progress_core::model::{Path, RemoteId};

use super::ticket::SyncTicket;
use crate::error::SyncError;

/// Result of `SyncService::begin`.
#[derive(Debug)]
pub enum SyncStart {
    /// The node was not dirty.
    Clean,
    /// Incomplete and never synced: dirty was cleared without a remote call.
    SettledLocally,
    /// A remote call is needed; the node is now in flight.
    Pending(SyncTicket),
}

/// What syncing one node did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSyncOutcome {
    Clean,
    SettledLocally,
    Created(RemoteId),
    Updated(RemoteId),
    Deleted,
    /// The tree was reset or the node vanished while the call was out.
    Discarded,
}

/// Per-path outcomes of a `sync_dirty` pass, sorted by path.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub synced: Vec<(Path, NodeSyncOutcome)>,
    pub failed: Vec<(Path, SyncError)>,
}

impl SyncReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn attempted(&self) -> usize {
        self.synced.len() + self.failed.len()
    }

    pub(crate) fn sort(&mut self) {
        self.synced.sort_by(|a, b| a.0.cmp(&b.0));
        self.failed.sort_by(|a, b| a.0.cmp(&b.0));
    }
}
