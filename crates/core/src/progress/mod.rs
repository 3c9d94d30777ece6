mod context;
mod registry;
mod tree;

pub use context::ProgressContext;
pub use registry::Registry;
pub use tree::{MergeOutcome, ProgressNode, ProgressTree, TreeError};
