use crate::model::{Course, NodeId};
use crate::progress::tree::{ProgressTree, TreeError};

/// Owner of the live progress tree and its registry.
///
/// Created once per process and passed to whoever needs the tree. Building
/// is idempotent; only `reset` discards progress.
#[derive(Debug, Default)]
pub struct ProgressContext {
    tree: Option<ProgressTree>,
    generation: u64,
}

impl ProgressContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the tree for `course` unless one already exists, and returns its root.
    ///
    /// An existing tree is returned untouched, whatever course is passed.
    ///
    /// # Errors
    ///
    /// Returns `TreeError` if the course contains duplicate paths.
    pub fn build(&mut self, course: &Course) -> Result<NodeId, TreeError> {
        if let Some(tree) = &self.tree {
            return Ok(tree.root());
        }
        let tree = ProgressTree::from_course(course)?;
        let root = tree.root();
        self.tree = Some(tree);
        Ok(root)
    }

    #[must_use]
    pub fn is_built(&self) -> bool {
        self.tree.is_some()
    }

    #[must_use]
    pub fn tree(&self) -> Option<&ProgressTree> {
        self.tree.as_ref()
    }

    pub fn tree_mut(&mut self) -> Option<&mut ProgressTree> {
        self.tree.as_mut()
    }

    /// Incremented on every reset. Remote results that started under an
    /// older generation must not be applied.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Discards the tree and its registry (e.g. on logout).
    pub fn reset(&mut self) {
        self.tree = None;
        self.generation += 1;
    }
}
