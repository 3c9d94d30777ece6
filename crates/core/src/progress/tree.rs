use std::ops::Index;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Course, NodeId, Path, PendingRecord, RemoteId, SchemaEntity, SnapshotRecord};
use crate::progress::registry::Registry;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TreeError {
    #[error("no node registered at {0}")]
    UnknownPath(Path),

    #[error("a node is already registered at {0}")]
    DuplicatePath(Path),

    #[error("a node needs a non-empty path")]
    EmptyPath,

    #[error("node {0} is not a leaf; completion is tracked on leaves only")]
    NotALeaf(Path),

    #[error("node {child} already has a parent")]
    AlreadyAttached { child: Path },

    #[error("attaching {child} under {parent} would create a cycle")]
    Cycle { parent: Path, child: Path },
}

//
// ─── NODE ──────────────────────────────────────────────────────────────────────
//

/// Trackable state for one structural unit of the course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressNode {
    path: Path,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    completed_on: Option<DateTime<Utc>>,
    dirty: bool,
    remote_id: Option<RemoteId>,
    in_flight: bool,
}

impl ProgressNode {
    fn new(path: Path) -> Self {
        Self {
            path,
            parent: None,
            children: Vec::new(),
            completed_on: None,
            dirty: false,
            remote_id: None,
            in_flight: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[must_use]
    pub fn completed_on(&self) -> Option<DateTime<Utc>> {
        self.completed_on
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_on.is_some()
    }

    /// True while a local change has not been confirmed by the remote store.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn remote_id(&self) -> Option<RemoteId> {
        self.remote_id
    }

    /// True while a remote sync for this node is outstanding.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Summary for the local snapshot, present only for completed nodes.
    #[must_use]
    pub fn snapshot(&self) -> Option<SnapshotRecord> {
        self.completed_on.map(|completed_on| SnapshotRecord {
            path: self.path.clone(),
            completed_on,
            remote_id: self.remote_id,
        })
    }

    /// Summary of unconfirmed work, present only for dirty nodes.
    #[must_use]
    pub fn pending(&self) -> Option<PendingRecord> {
        self.dirty.then(|| PendingRecord {
            path: self.path.clone(),
            remote_id: self.remote_id,
        })
    }
}

/// What happened when an external record was merged into the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    /// No node registered at the record's path (the schema changed).
    UnknownPath,
    /// The record targets an internal node; completion is leaf-only.
    NotALeaf,
}

//
// ─── TREE ──────────────────────────────────────────────────────────────────────
//

/// Arena-backed progress tree with its path registry.
///
/// Nodes are never removed; a tree is discarded as a whole on reset.
#[derive(Debug, Clone)]
pub struct ProgressTree {
    nodes: Vec<ProgressNode>,
    registry: Registry,
    root: NodeId,
}

impl ProgressTree {
    /// Creates a tree holding only a root node at `root_path`.
    #[must_use]
    pub fn new(root_path: Path) -> Self {
        let root = NodeId::new(0);
        let mut registry = Registry::new();
        registry.register(root_path.clone(), root);
        Self {
            nodes: vec![ProgressNode::new(root_path)],
            registry,
            root,
        }
    }

    /// Builds the full, empty progress tree for a course.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::DuplicatePath` if two schema entities share a path.
    /// Validated courses never do.
    pub fn from_course(course: &Course) -> Result<Self, TreeError> {
        let mut tree = Self::new(course.path());
        let root = tree.root;
        tree.expand(root, SchemaEntity::Course(course))?;
        Ok(tree)
    }

    fn expand(&mut self, parent: NodeId, entity: SchemaEntity<'_>) -> Result<(), TreeError> {
        for child in entity.children() {
            let id = self.insert(child.path())?;
            self.add_child(parent, id)?;
            self.expand(id, child)?;
        }
        Ok(())
    }

    /// Creates a detached node at `path` and registers it.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::EmptyPath` for an empty path, or
    /// `TreeError::DuplicatePath` if the path is already registered.
    pub fn insert(&mut self, path: Path) -> Result<NodeId, TreeError> {
        if path.is_empty() {
            return Err(TreeError::EmptyPath);
        }
        if self.registry.contains(&path) {
            return Err(TreeError::DuplicatePath(path));
        }
        let id = NodeId::new(self.nodes.len());
        self.registry.register(path.clone(), id);
        self.nodes.push(ProgressNode::new(path));
        Ok(id)
    }

    /// Appends `child` to `parent`'s children and links it back.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::AlreadyAttached` if `child` has a parent, or
    /// `TreeError::Cycle` if `child` is `parent` or one of its ancestors.
    ///
    /// # Panics
    ///
    /// Panics if either id was not issued by this tree.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let cycle = || TreeError::Cycle {
            parent: self.nodes[parent.index()].path.clone(),
            child: self.nodes[child.index()].path.clone(),
        };
        if parent == child || self.ancestors(parent).any(|a| a == child) {
            return Err(cycle());
        }
        if self.nodes[child.index()].parent.is_some() {
            return Err(TreeError::AlreadyAttached {
                child: self.nodes[child.index()].path.clone(),
            });
        }

        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
        Ok(())
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn lookup(&self, path: &Path) -> Option<NodeId> {
        self.registry.get(path)
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&ProgressNode> {
        self.nodes.get(id.index())
    }

    #[must_use]
    pub fn get_by_path(&self, path: &Path) -> Option<&ProgressNode> {
        self.lookup(path).and_then(|id| self.get(id))
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &ProgressNode {
        &self.nodes[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ProgressNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId::new(i), node))
    }

    /// Parent, grandparent, ... up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id.index()].parent, move |p| {
            self.nodes[p.index()].parent
        })
    }

    //
    // ─── AGGREGATES ────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn total_leaf_count(&self, id: NodeId) -> usize {
        let node = self.node(id);
        if node.is_leaf() {
            return 1;
        }
        node.children
            .iter()
            .map(|&child| self.total_leaf_count(child))
            .sum()
    }

    #[must_use]
    pub fn completed_leaf_count(&self, id: NodeId) -> usize {
        let node = self.node(id);
        if node.is_leaf() {
            return usize::from(node.is_completed());
        }
        node.children
            .iter()
            .map(|&child| self.completed_leaf_count(child))
            .sum()
    }

    /// `(completed, total)` leaves under `id`.
    #[must_use]
    pub fn progress(&self, id: NodeId) -> (usize, usize) {
        (self.completed_leaf_count(id), self.total_leaf_count(id))
    }

    /// Completed nodes under `id`, depth-first.
    ///
    /// A completed node is reported and its subtree is not descended.
    #[must_use]
    pub fn collect_completed(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_completed_into(id, &mut out);
        out
    }

    fn collect_completed_into(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let node = self.node(id);
        if node.is_completed() {
            out.push(id);
            return;
        }
        for &child in &node.children {
            self.collect_completed_into(child, out);
        }
    }

    /// Snapshot records for everything `collect_completed` reports from the root.
    #[must_use]
    pub fn snapshot_records(&self) -> Vec<SnapshotRecord> {
        self.collect_completed(self.root)
            .into_iter()
            .filter_map(|id| self.node(id).snapshot())
            .collect()
    }

    /// Pending records for every dirty node, ordered by path.
    #[must_use]
    pub fn pending_records(&self) -> Vec<PendingRecord> {
        self.dirty_nodes()
            .into_iter()
            .filter_map(|id| self.node(id).pending())
            .collect()
    }

    /// Dirty nodes ordered by path.
    #[must_use]
    pub fn dirty_nodes(&self) -> Vec<NodeId> {
        let mut dirty: Vec<NodeId> = self
            .iter()
            .filter(|(_, node)| node.dirty)
            .map(|(id, _)| id)
            .collect();
        dirty.sort_by(|a, b| self.node(*a).path.cmp(&self.node(*b).path));
        dirty
    }

    //
    // ─── MUTATION ──────────────────────────────────────────────────────────────
    //

    /// Sets or clears the completion timestamp and marks the node dirty.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::NotALeaf` for internal nodes; their status is
    /// derived from descendants.
    pub fn set_completion(
        &mut self,
        id: NodeId,
        completed_on: Option<DateTime<Utc>>,
    ) -> Result<(), TreeError> {
        let node = &mut self.nodes[id.index()];
        if !node.is_leaf() {
            return Err(TreeError::NotALeaf(node.path.clone()));
        }
        node.completed_on = completed_on;
        node.dirty = true;
        Ok(())
    }

    /// Completes the node at `now` if it is incomplete, otherwise clears it.
    /// Returns the new completion timestamp.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::NotALeaf` for internal nodes.
    pub fn toggle_completion(
        &mut self,
        id: NodeId,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, TreeError> {
        let next = if self.node(id).is_completed() {
            None
        } else {
            Some(now)
        };
        self.set_completion(id, next)?;
        Ok(next)
    }

    /// Overwrites a leaf's completion and remote id from an authoritative
    /// record (local snapshot or remote fetch) and clears its dirty flag.
    pub fn merge_record(&mut self, record: &SnapshotRecord) -> MergeOutcome {
        let Some(id) = self.lookup(&record.path) else {
            return MergeOutcome::UnknownPath;
        };
        let node = &mut self.nodes[id.index()];
        if !node.is_leaf() {
            return MergeOutcome::NotALeaf;
        }
        node.completed_on = Some(record.completed_on);
        node.remote_id = record.remote_id;
        node.dirty = false;
        MergeOutcome::Merged
    }

    /// Marks a leaf dirty again from a saved pending record.
    ///
    /// Completion is left as the snapshot restored it. A recorded remote id
    /// is put back so that a cleared node turns into a delete.
    pub fn restore_pending(&mut self, record: &PendingRecord) -> MergeOutcome {
        let Some(id) = self.lookup(&record.path) else {
            return MergeOutcome::UnknownPath;
        };
        let node = &mut self.nodes[id.index()];
        if !node.is_leaf() {
            return MergeOutcome::NotALeaf;
        }
        if record.remote_id.is_some() {
            node.remote_id = record.remote_id;
        }
        node.dirty = true;
        MergeOutcome::Merged
    }

    /// Records the outcome of a confirmed remote call.
    ///
    /// `dirty` is cleared only when `clear_dirty` is set, so a change made
    /// while the call was outstanding still gets synced later.
    pub fn confirm_sync(&mut self, id: NodeId, remote_id: Option<RemoteId>, clear_dirty: bool) {
        let node = &mut self.nodes[id.index()];
        node.remote_id = remote_id;
        if clear_dirty {
            node.dirty = false;
        }
    }

    pub fn set_in_flight(&mut self, id: NodeId, in_flight: bool) {
        self.nodes[id.index()].in_flight = in_flight;
    }

    /// Clears the dirty flag without a remote call.
    pub fn clear_dirty(&mut self, id: NodeId) {
        self.nodes[id.index()].dirty = false;
    }
}

impl Index<NodeId> for ProgressTree {
    type Output = ProgressNode;

    fn index(&self, id: NodeId) -> &ProgressNode {
        self.node(id)
    }
}
