//! Site targeting.

use crate::error::{GraphError, GraphResult};
use crate::graph::Graph;
use crate::node::NodeType;
use tracing::info;

/// Mark the sites taking part in this run.
///
/// With no filter (or an empty one) every site is targeted. With a filter
/// exactly the site with that identifier is targeted and every other site is
/// untargeted.
///
/// # Errors
///
/// Returns [`GraphError::SiteNotFound`] if no site matches. Targeting state
/// is left untouched in that case.
pub fn target_sites(graph: &mut Graph, filter: Option<&str>) -> GraphResult<()> {
    let filter = filter.filter(|id| !id.is_empty());

    if let Some(identifier) = filter {
        let exists = graph
            .vertices_by_type(NodeType::Site)
            .iter()
            .any(|node| node.identifier() == identifier);
        if !exists {
            return Err(GraphError::SiteNotFound {
                identifier: identifier.to_string(),
            });
        }
    }

    let mut targeted = 0;
    for node in graph.vertices_mut() {
        if node.node_type() != NodeType::Site {
            continue;
        }
        let selected = filter.is_none_or(|identifier| node.identifier() == identifier);
        node.set_targeted(selected);
        targeted += usize::from(selected);
    }

    info!(filter = filter.unwrap_or("*"), targeted, "targeted sites");
    Ok(())
}
