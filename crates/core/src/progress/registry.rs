use std::collections::HashMap;

use crate::model::{NodeId, Path};

/// Path → node lookup for one progress tree.
///
/// Entries are added while the tree is built and never removed individually;
/// the whole registry goes away with its tree.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<Path, NodeId>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` under `path`. Returns the previous occupant, if any.
    pub(crate) fn register(&mut self, path: Path, id: NodeId) -> Option<NodeId> {
        self.entries.insert(path, id)
    }

    #[must_use]
    pub fn get(&self, path: &Path) -> Option<NodeId> {
        self.entries.get(path).copied()
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
