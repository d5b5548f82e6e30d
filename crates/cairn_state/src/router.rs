//! Remote-state routing.
//!
//! A unit that reads `${component.<name>.<output>}` needs a remote-state
//! data source pointing at whichever unit ended up owning `<name>` after
//! reduction. The router finds that owner and asks the registry for its
//! backend.

use crate::error::RouteError;
use crate::registry::StateRegistry;
use cairn_core::NodePath;
use cairn_plan::{Graph, Node, NodeType};
use serde::Serialize;
use tracing::debug;

/// A remote-state dependency of one unit on another
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteStateLink {
    /// Referenced component
    pub component: String,
    /// Unit owning the component's state
    pub owner: NodePath,
    /// Registry key of the owner
    pub state_key: String,
    /// Rendered data source
    pub remote_state: String,
}

/// Resolves component references against a reduced graph
#[derive(Debug, Clone, Copy)]
pub struct Router<'a> {
    graph: &'a Graph,
    registry: &'a StateRegistry,
}

impl<'a> Router<'a> {
    /// Create a router
    #[must_use]
    pub fn new(graph: &'a Graph, registry: &'a StateRegistry) -> Self {
        Self { graph, registry }
    }

    /// The deployable unit that owns `component`, seen from `from`.
    ///
    /// Preference order: a component vertex in the same site, the same site
    /// if the component was folded into it, then the first site in graph
    /// order owning it as a vertex or folded config.
    #[must_use]
    pub fn owner(&self, from: &Node, component: &str) -> Option<&'a Node> {
        let site = match from.node_type() {
            NodeType::Project => None,
            NodeType::Site => Some(from.path().clone()),
            NodeType::SiteComponent => from.parent().cloned(),
        };

        if let Some(site) = site {
            if let Some(owner) = self.owner_in_site(&site, component) {
                return Some(owner);
            }
        }

        self.graph
            .vertices_by_type(NodeType::Site)
            .into_iter()
            .find_map(|site| self.owner_in_site(site.path(), component))
    }

    fn owner_in_site(&self, site: &NodePath, component: &str) -> Option<&'a Node> {
        let vertex = site
            .child(component)
            .ok()
            .and_then(|path| self.graph.vertex(path.as_str()))
            .filter(|node| node.node_type() == NodeType::SiteComponent);
        if vertex.is_some() {
            return vertex;
        }

        self.graph
            .vertex(site.as_str())
            .filter(|node| node.owns_component(component))
    }

    /// Remote-state links for the unit at `path`, one per referenced
    /// component owned by another unit, in first-reference order.
    ///
    /// # Errors
    ///
    /// Returns error if the vertex is unknown, a reference is malformed, a
    /// referenced component is not deployed anywhere, or its owner has no
    /// backend
    pub fn links(&self, path: &str) -> Result<Vec<RemoteStateLink>, RouteError> {
        let node = self.graph.vertex(path).ok_or_else(|| RouteError::VertexNotFound {
            path: path.to_string(),
        })?;

        let mut links = Vec::new();
        for component in node.referenced_components()? {
            let owner = self
                .owner(node, &component)
                .ok_or_else(|| RouteError::UnknownComponent {
                    component: component.clone(),
                    referenced_by: path.to_string(),
                })?;

            if owner.path() == node.path() {
                debug!(path, component = %component, "elided self reference");
                continue;
            }

            let key = owner.state_key();
            let backend = self
                .registry
                .get(key)
                .ok_or_else(|| RouteError::MissingBackend {
                    identifier: owner.identifier().to_string(),
                    key: key.to_string(),
                })?;

            links.push(RemoteStateLink {
                component,
                owner: owner.path().clone(),
                state_key: key.to_string(),
                remote_state: backend.remote_state()?,
            });
        }

        debug!(path, links = links.len(), "routed remote state");
        Ok(links)
    }

    /// Every data source the unit at `path` needs, concatenated
    ///
    /// # Errors
    ///
    /// Same as [`links`](Self::links)
    pub fn render(&self, path: &str) -> Result<String, RouteError> {
        let links = self.links(path)?;
        Ok(links
            .into_iter()
            .map(|link| link.remote_state)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
