//! Taint propagation.
//!
//! Tainting a vertex never taints anything else on its own. Callers that
//! want dependents redeployed together with a tainted unit ask for it here.

use crate::graph::Graph;
use cairn_core::NodePath;
use indexmap::IndexSet;
use tracing::debug;

/// Taint every vertex reachable from an already tainted vertex.
///
/// Returns the newly tainted paths in graph order.
pub fn propagate_taint(graph: &mut Graph) -> Vec<NodePath> {
    let tainted: Vec<NodePath> = graph
        .vertices()
        .filter(|node| node.tainted())
        .map(|node| node.path().clone())
        .collect();

    let mut reached: IndexSet<NodePath> = IndexSet::new();
    for path in &tainted {
        reached.extend(graph.descendants(path.as_str()));
    }

    let mut newly = Vec::new();
    for node in graph.vertices_mut() {
        if !node.tainted() && reached.contains(node.path()) {
            node.set_tainted(true);
            newly.push(node.path().clone());
        }
    }

    debug!(seeds = tainted.len(), propagated = newly.len(), "propagated taint");
    newly
}
