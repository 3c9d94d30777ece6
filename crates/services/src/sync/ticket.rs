use std::sync::Arc;

use chrono::{DateTime, Utc};
use progress_core::model::{NodeId, Path, RemoteId, RemoteRecord};

use crate::auth::Credential;
use crate::error::SyncError;
use crate::remote::ProgressRemote;

/// Remote call needed to bring one node in line with the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Create {
        completed_on: DateTime<Utc>,
    },
    Update {
        id: RemoteId,
        completed_on: DateTime<Utc>,
    },
    Delete {
        id: RemoteId,
    },
}

impl SyncAction {
    /// Local completion the action was computed from.
    #[must_use]
    pub fn sent_completion(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Create { completed_on } | Self::Update { completed_on, .. } => {
                Some(*completed_on)
            }
            Self::Delete { .. } => None,
        }
    }
}

/// What the server confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEffect {
    Created(RemoteRecord),
    Updated(RemoteId),
    Deleted,
}

/// A sync that has been started on the tree and not yet sent.
///
/// Holds everything the remote call needs, so it can run without touching
/// the tree.
#[derive(Debug)]
pub struct SyncTicket {
    pub(crate) generation: u64,
    pub(crate) node: NodeId,
    pub(crate) path: Path,
    pub(crate) action: SyncAction,
    pub(crate) credential: Credential,
}

impl SyncTicket {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn action(&self) -> &SyncAction {
        &self.action
    }

    /// Perform the remote call. The returned future is `Send + 'static`.
    pub async fn execute(self, remote: Arc<dyn ProgressRemote>) -> SyncCompletion {
        let result = match &self.action {
            SyncAction::Create { completed_on } => remote
                .create(&self.credential, &self.path, *completed_on)
                .await
                .map(RemoteEffect::Created),
            SyncAction::Update { id, completed_on } => remote
                .update(&self.credential, *id, &self.path, *completed_on)
                .await
                .map(|()| RemoteEffect::Updated(*id)),
            SyncAction::Delete { id } => remote
                .delete(&self.credential, *id)
                .await
                .map(|()| RemoteEffect::Deleted),
        };
        SyncCompletion {
            generation: self.generation,
            node: self.node,
            path: self.path,
            action: self.action,
            result,
        }
    }
}

/// Outcome of an executed ticket, waiting to be applied to the tree.
#[derive(Debug)]
pub struct SyncCompletion {
    pub(crate) generation: u64,
    pub(crate) node: NodeId,
    pub(crate) path: Path,
    pub(crate) action: SyncAction,
    pub(crate) result: Result<RemoteEffect, SyncError>,
}

impl SyncCompletion {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
