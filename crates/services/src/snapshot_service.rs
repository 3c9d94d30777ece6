use std::sync::Arc;

use progress_core::progress::{MergeOutcome, ProgressContext};
use storage::repository::SnapshotStore;
use tracing::{debug, info};

use crate::error::SnapshotError;

/// Saves completed nodes to the local store and restores them on startup.
///
/// Nodes with unconfirmed changes are saved as a separate pending list, so
/// a change that never reached the remote store is retried after a restart.
#[derive(Clone)]
pub struct SnapshotService {
    store: Arc<dyn SnapshotStore>,
}

impl SnapshotService {
    #[must_use]
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Persist every completed node reachable from the root, replacing the
    /// previous snapshot, together with the list of dirty nodes. Returns the
    /// number of snapshot records written.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::NotBuilt` before the tree exists, or the
    /// storage failure.
    pub async fn save(&self, ctx: &ProgressContext) -> Result<usize, SnapshotError> {
        let tree = ctx.tree().ok_or(SnapshotError::NotBuilt)?;
        let records = tree.snapshot_records();
        let pending = tree.pending_records();
        // Pending first: a crash in between only repeats a sync.
        self.store.write_pending(&pending).await?;
        self.store.write_snapshot(&records).await?;
        info!(
            records = records.len(),
            pending = pending.len(),
            "saved progress snapshot"
        );
        Ok(records.len())
    }

    /// Merge the stored snapshot into the live tree, then mark the saved
    /// pending nodes dirty again. Records for paths the tree does not know
    /// are skipped. Returns the number of snapshot records merged.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::NotBuilt` before the tree exists, or the
    /// storage failure. The tree is untouched on error.
    pub async fn load(&self, ctx: &mut ProgressContext) -> Result<usize, SnapshotError> {
        if !ctx.is_built() {
            return Err(SnapshotError::NotBuilt);
        }
        let records = self.store.read_snapshot().await?;
        let pending = self.store.read_pending().await?;
        let tree = ctx.tree_mut().ok_or(SnapshotError::NotBuilt)?;

        let mut merged = 0;
        for record in &records {
            match tree.merge_record(record) {
                MergeOutcome::Merged => merged += 1,
                MergeOutcome::UnknownPath | MergeOutcome::NotALeaf => {
                    debug!(path = %record.path, "skipping snapshot record");
                }
            }
        }
        let mut restored = 0;
        for record in &pending {
            match tree.restore_pending(record) {
                MergeOutcome::Merged => restored += 1,
                MergeOutcome::UnknownPath | MergeOutcome::NotALeaf => {
                    debug!(path = %record.path, "skipping pending record");
                }
            }
        }
        info!(read = records.len(), merged, restored, "loaded progress snapshot");
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::model::{
        CourseDraft, LessonDraft, Path, PendingRecord, RemoteId, SnapshotRecord, UnitDraft,
    };
    use progress_core::time::fixed_now;
    use storage::repository::InMemorySnapshotStore;

    fn built_context() -> ProgressContext {
        let course = CourseDraft {
            title: "Course".into(),
            version: 1,
            units: vec![UnitDraft {
                index_path: None,
                title: "Unit".into(),
                lessons: vec![LessonDraft {
                    index_path: None,
                    title: "Lesson".into(),
                    has_lab: false,
                    review_questions: 0,
                }],
            }],
        }
        .validate()
        .unwrap();
        let mut ctx = ProgressContext::new();
        ctx.build(&course).unwrap();
        ctx
    }

    #[tokio::test]
    async fn save_before_build_is_rejected() {
        let service = SnapshotService::new(Arc::new(InMemorySnapshotStore::new()));
        let ctx = ProgressContext::new();
        assert!(matches!(
            service.save(&ctx).await,
            Err(SnapshotError::NotBuilt)
        ));
    }

    #[tokio::test]
    async fn load_skips_unknown_paths() {
        let store = InMemorySnapshotStore::new();
        store
            .write_snapshot(&[
                SnapshotRecord {
                    path: Path::from([1, 1, 0]),
                    completed_on: fixed_now(),
                    remote_id: Some(RemoteId::new(3)),
                },
                SnapshotRecord {
                    path: Path::from([9, 9, 0]),
                    completed_on: fixed_now(),
                    remote_id: None,
                },
            ])
            .await
            .unwrap();

        let service = SnapshotService::new(Arc::new(store));
        let mut ctx = built_context();
        assert_eq!(service.load(&mut ctx).await.unwrap(), 1);

        let node = ctx
            .tree()
            .unwrap()
            .get_by_path(&Path::from([1, 1, 0]))
            .unwrap();
        assert_eq!(node.remote_id(), Some(RemoteId::new(3)));
        assert!(!node.is_dirty());
    }

    #[tokio::test]
    async fn save_writes_dirty_nodes_as_pending() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let service = SnapshotService::new(store.clone());
        let mut ctx = built_context();
        let tree = ctx.tree_mut().unwrap();
        let reading = tree.lookup(&Path::from([1, 1, 0])).unwrap();
        tree.set_completion(reading, Some(fixed_now())).unwrap();

        assert_eq!(service.save(&ctx).await.unwrap(), 1);
        assert_eq!(
            store.read_pending().await.unwrap(),
            vec![PendingRecord {
                path: Path::from([1, 1, 0]),
                remote_id: None,
            }]
        );

        let mut restored = built_context();
        service.load(&mut restored).await.unwrap();
        let node = restored
            .tree()
            .unwrap()
            .get_by_path(&Path::from([1, 1, 0]))
            .unwrap();
        assert_eq!(node.completed_on(), Some(fixed_now()));
        assert!(node.is_dirty());
    }
}
