//! Graph reduction.
//!
//! Folds every site component that is not its own deployable unit into its
//! site. The folded vertex disappears, its configuration is appended to the
//! site's nested configs, and its predecessors are wired straight to its
//! children so no dependency is lost.

use crate::error::{GraphError, GraphResult};
use crate::graph::Graph;
use crate::node::NodeType;
use cairn_core::NodePath;
use serde::Serialize;
use tracing::{debug, info};

/// Outcome of a reduction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReductionReport {
    /// Collapsed vertices, in collapse order
    pub merged: Vec<NodePath>,
    /// Edges added while rewiring
    pub edges_added: usize,
}

impl ReductionReport {
    /// Whether the pass changed the graph
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.merged.is_empty()
    }
}

/// Collapse a single vertex into its parent site.
///
/// Returns `Ok(false)` without touching the graph when the vertex is
/// already independent.
///
/// # Errors
///
/// Returns [`GraphError::VertexNotFound`] for an unknown path and
/// [`GraphError::InvariantViolation`] when a non-independent vertex is not a
/// site component hanging off a site
pub fn collapse(graph: &mut Graph, path: &str) -> GraphResult<bool> {
    Ok(collapse_counted(graph, path)?.is_some())
}

fn collapse_counted(graph: &mut Graph, path: &str) -> GraphResult<Option<usize>> {
    let node = graph.vertex(path).ok_or_else(|| GraphError::VertexNotFound {
        path: path.to_string(),
    })?;
    if node.independent() {
        return Ok(None);
    }

    let violation = |reason: &str| GraphError::InvariantViolation {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let Some(component) = node.as_site_component() else {
        return Err(violation("only site components can be folded"));
    };
    let parent = node
        .parent()
        .cloned()
        .ok_or_else(|| violation("site component has no parent"))?;
    if graph.vertex(parent.as_str()).map(|p| p.node_type()) != Some(NodeType::Site) {
        return Err(violation("parent is not a site"));
    }

    let config = component.config.clone();
    let children = graph.children(path);
    let predecessors = graph.predecessors(path);

    for child in &children {
        graph.remove_edge(path, child.as_str())?;
    }
    for pred in &predecessors {
        graph.remove_edge(pred.as_str(), path)?;
    }

    let mut added = 0;
    for pred in &predecessors {
        for child in &children {
            if !graph.has_edge(pred.as_str(), child.as_str()) {
                graph.add_edge(pred.as_str(), child.as_str())?;
                added += 1;
            }
        }
    }

    graph.remove_vertex(path)?;

    if let Some(site) = graph.vertex_mut(parent.as_str()).and_then(|p| p.as_site_mut()) {
        site.nested_site_component_configs.push(config);
    }

    debug!(
        component = %path,
        site = %parent,
        rewired = added,
        "folded site component into site"
    );

    Ok(Some(added))
}

/// Reduce the graph so that every remaining vertex is independent.
///
/// Vertices are visited in a breadth-first snapshot taken before any
/// mutation; vertices already removed are skipped.
///
/// # Errors
///
/// Returns [`GraphError::InvariantViolation`] if a vertex cannot be folded.
/// Reduction stops at the first violation.
pub fn reduce(graph: &mut Graph) -> GraphResult<ReductionReport> {
    let mut report = ReductionReport::default();

    for path in graph.bfs_order() {
        if !graph.vertex_exists(path.as_str()) {
            continue;
        }
        if let Some(added) = collapse_counted(graph, path.as_str())? {
            report.edges_added += added;
            report.merged.push(path);
        }
    }

    info!(
        merged = report.merged.len(),
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        "reduced deployment graph"
    );

    Ok(report)
}
