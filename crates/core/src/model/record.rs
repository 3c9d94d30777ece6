use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::RemoteId;
use crate::model::path::Path;

/// Persisted summary of one completed node, as kept in the local snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub path: Path,
    pub completed_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteId>,
}

/// A node whose local change the remote store has not confirmed yet.
///
/// Kept next to the snapshot so unsent work survives a restart. The remote
/// id is recorded even for cleared nodes, which the snapshot omits, so a
/// pending delete can still be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRecord {
    pub path: Path,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteId>,
}

/// Progress record as held by the remote store.
///
/// Remote records always carry an identifier; the server assigns it on create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub id: RemoteId,
    pub path: Path,
    pub completed_on: DateTime<Utc>,
}

impl From<RemoteRecord> for SnapshotRecord {
    fn from(record: RemoteRecord) -> Self {
        Self {
            path: record.path,
            completed_on: record.completed_on,
            remote_id: Some(record.id),
        }
    }
}
