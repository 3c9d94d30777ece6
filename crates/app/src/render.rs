use std::fmt::Write;

use progress_core::model::{Course, NodeId};
use progress_core::progress::ProgressTree;

/// Plain-text outline of the tree with per-node progress.
///
/// Leaves show `[x]` with their completion date, and `*` when they have
/// changes the server has not confirmed yet.
pub fn outline(course: &Course, tree: &ProgressTree) -> String {
    let mut out = String::new();
    write_node(&mut out, course, tree, tree.root(), 0);
    out
}

fn write_node(out: &mut String, course: &Course, tree: &ProgressTree, id: NodeId, depth: usize) {
    let node = tree.node(id);
    let title = course
        .find(node.path())
        .map_or("(untitled)", |entity| entity.title());
    let indent = "  ".repeat(depth);
    let label = if depth == 0 {
        String::new()
    } else {
        format!("{} ", node.path().dot_text())
    };

    if node.is_leaf() {
        let mark = if node.is_completed() { "x" } else { " " };
        let _ = write!(out, "{indent}[{mark}] {label}{title}");
        if let Some(on) = node.completed_on() {
            let _ = write!(out, "  {}", on.format("%Y-%m-%d"));
        }
        if node.is_dirty() {
            out.push_str("  *");
        }
    } else {
        let (completed, total) = tree.progress(id);
        let _ = write!(out, "{indent}{label}{title}  {completed}/{total}");
    }
    out.push('\n');

    for child in node.children() {
        write_node(out, course, tree, *child, depth + 1);
    }
}
