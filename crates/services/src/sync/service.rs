use std::collections::HashSet;
use std::sync::Arc;

use progress_core::model::{Path, SnapshotRecord};
use progress_core::progress::{MergeOutcome, ProgressContext};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::report::{NodeSyncOutcome, SyncReport, SyncStart};
use super::ticket::{RemoteEffect, SyncAction, SyncCompletion, SyncTicket};
use crate::Clock;
use crate::auth::AuthSession;
use crate::error::SyncError;
use crate::remote::ProgressRemote;

//
// ─── SYNC SERVICE ──────────────────────────────────────────────────────────────
//

/// Reconciles the local progress tree with the remote store.
///
/// A node sync runs in three steps. `begin` inspects the node, marks it in
/// flight and captures the request. `SyncTicket::execute` performs the remote
/// call without borrowing the tree. `apply` writes the result back. The
/// convenience methods `sync_node` and `sync_dirty` chain the three.
#[derive(Clone)]
pub struct SyncService {
    clock: Clock,
    remote: Arc<dyn ProgressRemote>,
    session: AuthSession,
}

impl SyncService {
    #[must_use]
    pub fn new(clock: Clock, remote: Arc<dyn ProgressRemote>, session: AuthSession) -> Self {
        Self {
            clock,
            remote,
            session,
        }
    }

    #[must_use]
    pub fn remote(&self) -> Arc<dyn ProgressRemote> {
        Arc::clone(&self.remote)
    }

    /// Start syncing the node at `path`.
    ///
    /// | completed | remote id | result |
    /// |---|---|---|
    /// | yes | no | `Pending(Create)` |
    /// | yes | yes | `Pending(Update)` |
    /// | no | yes | `Pending(Delete)` |
    /// | no | no | dirty cleared, `SettledLocally` |
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotBuilt`, `SyncError::UnknownPath`,
    /// `SyncError::InFlight`, or an authentication error if a remote call
    /// is needed and no usable credential is held. The node is untouched on
    /// error.
    pub fn begin(&self, ctx: &mut ProgressContext, path: &Path) -> Result<SyncStart, SyncError> {
        let generation = ctx.generation();
        let tree = ctx.tree_mut().ok_or(SyncError::NotBuilt)?;
        let id = tree
            .lookup(path)
            .ok_or_else(|| SyncError::UnknownPath(path.clone()))?;

        let node = tree.node(id);
        if node.is_in_flight() {
            return Err(SyncError::InFlight(path.clone()));
        }
        if !node.is_dirty() {
            return Ok(SyncStart::Clean);
        }

        let action = match (node.completed_on(), node.remote_id()) {
            (Some(completed_on), None) => SyncAction::Create { completed_on },
            (Some(completed_on), Some(id)) => SyncAction::Update { id, completed_on },
            (None, Some(id)) => SyncAction::Delete { id },
            (None, None) => {
                tree.clear_dirty(id);
                debug!(path = %path, "settled locally");
                return Ok(SyncStart::SettledLocally);
            }
        };

        let credential = self.session.current(self.clock.now())?;
        tree.set_in_flight(id, true);
        debug!(path = %path, ?action, "sync started");
        Ok(SyncStart::Pending(SyncTicket {
            generation,
            node: id,
            path: path.clone(),
            action,
            credential,
        }))
    }

    /// Write an executed ticket's result back to the tree.
    ///
    /// Results from an older generation, or for a node that is no longer
    /// registered, are dropped as `Discarded`. If the node's completion
    /// changed while the call was out, the confirmed identifier is recorded
    /// but the node stays dirty.
    ///
    /// # Errors
    ///
    /// Returns the remote failure. The node then stays dirty with its remote
    /// id unchanged. `AuthExpired` also signs the session out.
    pub fn apply(
        &self,
        ctx: &mut ProgressContext,
        completion: SyncCompletion,
    ) -> Result<NodeSyncOutcome, SyncError> {
        let SyncCompletion {
            generation,
            node,
            path,
            action,
            result,
        } = completion;

        if let Err(err) = &result {
            self.session.observe(err);
        }

        if generation != ctx.generation() {
            debug!(path = %path, "dropping sync result from a discarded tree");
            return Ok(NodeSyncOutcome::Discarded);
        }
        let Some(tree) = ctx.tree_mut() else {
            return Ok(NodeSyncOutcome::Discarded);
        };
        let Some(id) = tree.lookup(&path).filter(|id| *id == node) else {
            debug!(path = %path, "dropping sync result for unregistered node");
            return Ok(NodeSyncOutcome::Discarded);
        };

        tree.set_in_flight(id, false);
        let effect = match result {
            Ok(effect) => effect,
            Err(err) => {
                warn!(path = %path, error = %err, "sync failed; node stays dirty");
                return Err(err);
            }
        };

        let unchanged = tree.node(id).completed_on() == action.sent_completion();
        if !unchanged {
            debug!(path = %path, "node changed while syncing; kept dirty");
        }
        let outcome = match effect {
            RemoteEffect::Created(record) => {
                tree.confirm_sync(id, Some(record.id), unchanged);
                NodeSyncOutcome::Created(record.id)
            }
            RemoteEffect::Updated(remote_id) => {
                tree.confirm_sync(id, Some(remote_id), unchanged);
                NodeSyncOutcome::Updated(remote_id)
            }
            RemoteEffect::Deleted => {
                tree.confirm_sync(id, None, unchanged);
                NodeSyncOutcome::Deleted
            }
        };
        debug!(path = %path, ?outcome, "sync applied");
        Ok(outcome)
    }

    /// Sync a single node and wait for the result.
    ///
    /// # Errors
    ///
    /// Returns any error from `begin`, or the remote failure from `apply`.
    pub async fn sync_node(
        &self,
        ctx: &mut ProgressContext,
        path: &Path,
    ) -> Result<NodeSyncOutcome, SyncError> {
        match self.begin(ctx, path)? {
            SyncStart::Clean => Ok(NodeSyncOutcome::Clean),
            SyncStart::SettledLocally => Ok(NodeSyncOutcome::SettledLocally),
            SyncStart::Pending(ticket) => {
                let completion = ticket.execute(self.remote()).await;
                self.apply(ctx, completion)
            }
        }
    }

    /// Sync every dirty node that is not already in flight. Remote calls for
    /// different nodes run concurrently.
    ///
    /// Nodes that settle locally do so even without a credential.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotBuilt`, or an authentication error when some
    /// node needs a remote call and no usable credential is held. Other
    /// per-node failures are reported in the `SyncReport` instead.
    pub async fn sync_dirty(&self, ctx: &mut ProgressContext) -> Result<SyncReport, SyncError> {
        let tree = ctx.tree().ok_or(SyncError::NotBuilt)?;
        let paths: Vec<Path> = tree
            .dirty_nodes()
            .into_iter()
            .map(|id| tree.node(id))
            .filter(|node| !node.is_in_flight())
            .map(|node| node.path().clone())
            .collect();

        let mut report = SyncReport::default();
        let mut login_failures = Vec::new();
        let mut tasks = JoinSet::new();
        let mut outstanding = HashSet::new();
        for path in paths {
            match self.begin(ctx, &path) {
                Ok(SyncStart::Pending(ticket)) => {
                    outstanding.insert(path);
                    tasks.spawn(ticket.execute(self.remote()));
                }
                Ok(SyncStart::SettledLocally) => {
                    report.synced.push((path, NodeSyncOutcome::SettledLocally));
                }
                Ok(SyncStart::Clean) => {}
                Err(err) if err.needs_login() => login_failures.push((path, err)),
                Err(err) => report.failed.push((path, err)),
            }
        }

        if tasks.is_empty() {
            if let Some((_, err)) = login_failures.into_iter().next() {
                info!(
                    settled = report.synced.len(),
                    "sync pass stopped; remote calls need a login"
                );
                return Err(err);
            }
        } else {
            report.failed.append(&mut login_failures);
        }

        while let Some(joined) = tasks.join_next().await {
            let completion = match joined {
                Ok(completion) => completion,
                Err(err) => {
                    warn!(error = %err, "sync task ended without a result");
                    continue;
                }
            };
            let path = completion.path().clone();
            outstanding.remove(&path);
            match self.apply(ctx, completion) {
                Ok(outcome) => report.synced.push((path, outcome)),
                Err(err) => report.failed.push((path, err)),
            }
        }

        // Tasks that panicked never reported back; release their nodes.
        if let Some(tree) = ctx.tree_mut() {
            for path in outstanding {
                if let Some(id) = tree.lookup(&path) {
                    tree.set_in_flight(id, false);
                }
                report.failed.push((
                    path,
                    SyncError::Transport("sync task ended without a result".into()),
                ));
            }
        }

        report.sort();
        info!(
            synced = report.synced.len(),
            failed = report.failed.len(),
            "sync pass finished"
        );
        Ok(report)
    }

    /// Pull every remote record and overwrite the matching local leaves.
    ///
    /// Remote is authoritative: merged nodes take the remote completion and
    /// identifier and are no longer dirty. Records for unknown paths are
    /// skipped. Returns the number merged.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotBuilt`, an authentication error, or the remote
    /// failure. A malformed payload leaves the tree unchanged.
    pub async fn fetch_all(&self, ctx: &mut ProgressContext) -> Result<usize, SyncError> {
        if !ctx.is_built() {
            return Err(SyncError::NotBuilt);
        }
        let credential = self.session.current(self.clock.now())?;
        let records = self
            .remote
            .fetch_all(&credential)
            .await
            .inspect_err(|err| {
                self.session.observe(err);
                warn!(error = %err, "fetching remote progress failed");
            })?;

        let tree = ctx.tree_mut().ok_or(SyncError::NotBuilt)?;
        let fetched = records.len();
        let mut merged = 0;
        for record in records {
            let record = SnapshotRecord::from(record);
            match tree.merge_record(&record) {
                MergeOutcome::Merged => merged += 1,
                MergeOutcome::UnknownPath => {
                    debug!(path = %record.path, "skipping remote record with no local node");
                }
                MergeOutcome::NotALeaf => {
                    warn!(path = %record.path, "skipping remote record for a non-leaf node");
                }
            }
        }
        info!(fetched, merged, "merged remote progress");
        Ok(merged)
    }
}
