//! Builds the unreduced Project → Site → SiteComponent tree from a resolved
//! project configuration.

use crate::error::GraphResult;
use crate::graph::Graph;
use crate::node::{Node, ProjectNode};
use crate::validate::Validator;
use cairn_config::{DeploymentType, ProjectConfig};
use cairn_core::NodePath;
use std::borrow::Cow;
use tracing::{debug, info};

/// Options threaded through graph construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphOptions {
    /// Granularity that replaces the project's global default
    pub deployment: Option<DeploymentType>,
    /// Run structural validation after each stage
    pub validate: bool,
}

impl GraphOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self {
            deployment: None,
            validate: true,
        }
    }

    /// Override the global granularity
    #[must_use]
    pub fn with_deployment(mut self, deployment: DeploymentType) -> Self {
        self.deployment = Some(deployment);
        self
    }

    /// Enable or disable structural validation
    #[must_use]
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the unreduced deployment tree
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    options: GraphOptions,
}

impl GraphBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new(options: GraphOptions) -> Self {
        Self { options }
    }

    /// Options in effect
    #[must_use]
    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    /// Build the tree. Either the whole graph is returned or an error; a
    /// partially built graph is never exposed.
    ///
    /// # Errors
    ///
    /// Returns error on duplicate names, invalid identifiers, site components
    /// that reference an unregistered component, or malformed references
    pub fn build(&self, cfg: &ProjectConfig) -> GraphResult<Graph> {
        cfg.validate()?;

        let cfg: Cow<'_, ProjectConfig> = match self.options.deployment {
            Some(deployment) if deployment != cfg.deployment => {
                Cow::Owned(cfg.clone().with_deployment(deployment))
            }
            _ => Cow::Borrowed(cfg),
        };

        let mut graph = Graph::new();
        let root = NodePath::root(&cfg.name)?;
        graph.add_vertex(Node::project(
            root.clone(),
            ProjectNode {
                name: cfg.name.clone(),
                environment: cfg.environment.clone(),
                deployment: cfg.deployment,
                variables: cfg.variables.clone(),
            },
        ))?;

        for site in &cfg.sites {
            let site_path = root.child(&site.identifier)?;
            let deployment = DeploymentType::resolve(cfg.deployment, site.deployment, None);
            graph.add_vertex(Node::site(site_path.clone(), root.clone(), site.clone(), deployment))?;
            graph.add_edge(root.as_str(), site_path.as_str())?;

            for entry in &site.components {
                let resolved = cfg.resolve_site_component(site, entry)?;
                let component_path = site_path.child(&entry.name)?;
                graph.add_vertex(Node::site_component(component_path.clone(), site_path.clone(), resolved))?;
                graph.add_edge(site_path.as_str(), component_path.as_str())?;
            }

            debug!(
                site = %site.identifier,
                deployment = %deployment,
                components = site.components.len(),
                "added site"
            );
        }

        if self.options.validate {
            Validator::new().validate_tree(&graph)?;
        }

        info!(
            project = %cfg.name,
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            "built deployment tree"
        );

        Ok(graph)
    }
}
