//! End-to-end construction of the reduced deployment graph.

use crate::builder::{GraphBuilder, GraphOptions};
use crate::error::GraphResult;
use crate::graph::Graph;
use crate::reduce::reduce;
use crate::validate::Validator;
use cairn_config::ProjectConfig;

/// Build the tree for `cfg` and reduce it to independently deployable units.
///
/// # Errors
///
/// Returns configuration errors from construction, invariant violations from
/// reduction, and structural errors when validation is enabled
pub fn to_deployment_graph(cfg: &ProjectConfig, options: &GraphOptions) -> GraphResult<Graph> {
    let mut graph = GraphBuilder::new(options.clone()).build(cfg)?;
    reduce(&mut graph)?;

    if options.validate {
        Validator::new().validate_reduced(&graph)?;
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeType;
    use cairn_config::{ComponentConfig, DeploymentType, SiteComponentConfig, SiteConfig};

    #[test]
    fn test_to_deployment_graph_project_granularity() {
        let cfg = ProjectConfig::new("main")
            .with_deployment(DeploymentType::Project)
            .with_component(ComponentConfig::new("a", "./a", "1"))
            .with_site(SiteConfig::new("site-1").with_component(SiteComponentConfig::new("a")))
            .with_site(SiteConfig::new("site-2").with_component(SiteComponentConfig::new("a")));

        let graph = to_deployment_graph(&cfg, &GraphOptions::default()).unwrap();
        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.vertices_by_type(NodeType::SiteComponent).is_empty());
        assert!(graph.vertices().all(|n| n.independent()));
    }
}
