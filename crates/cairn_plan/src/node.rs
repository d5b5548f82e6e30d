//! Graph nodes.
//!
//! A node is one of three variants sharing a common header (path, parent,
//! taint and target flags). The parent is stored as a path key and resolved
//! through the owning [`Graph`](crate::Graph); nodes never own each other.

use cairn_config::{ConfigResult, DeploymentType, ResolvedSiteComponent, SiteConfig, VariablesMap};
use cairn_core::{ContentHasher, CoreResult, Hash, NodePath};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    /// Root of the graph
    Project,
    /// A site
    Site,
    /// A component deployed into a site
    SiteComponent,
}

impl NodeType {
    /// Kebab-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Site => "site",
            Self::SiteComponent => "site-component",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectNode {
    /// Project name
    pub name: String,
    /// Environment label
    pub environment: Option<String>,
    /// Global granularity
    pub deployment: DeploymentType,
    /// Project-wide variables
    pub variables: VariablesMap,
}

/// Site payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteNode {
    /// Site configuration as written
    pub config: SiteConfig,
    /// Effective site granularity
    pub deployment: DeploymentType,
    /// Components folded into this site by reduction
    pub nested_site_component_configs: Vec<ResolvedSiteComponent>,
}

impl SiteNode {
    /// Names of the folded components, in fold order
    #[must_use]
    pub fn nested_component_names(&self) -> Vec<&str> {
        self.nested_site_component_configs
            .iter()
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Whether `component` was folded into this site
    #[must_use]
    pub fn has_nested(&self, component: &str) -> bool {
        self.nested_site_component_configs
            .iter()
            .any(|c| c.name == component)
    }
}

/// Site component payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteComponentNode {
    /// Resolved component configuration
    pub config: ResolvedSiteComponent,
}

/// Variant payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NodeKind {
    /// Root
    Project(ProjectNode),
    /// Site
    Site(SiteNode),
    /// Site component
    SiteComponent(SiteComponentNode),
}

/// A vertex of the deployment graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    path: NodePath,
    parent: Option<NodePath>,
    tainted: bool,
    targeted: bool,
    kind: NodeKind,
}

impl Node {
    /// Create the project root
    #[must_use]
    pub fn project(path: NodePath, payload: ProjectNode) -> Self {
        Self::with_kind(path, None, NodeKind::Project(payload))
    }

    /// Create a site under `parent`
    #[must_use]
    pub fn site(path: NodePath, parent: NodePath, config: SiteConfig, deployment: DeploymentType) -> Self {
        Self::with_kind(
            path,
            Some(parent),
            NodeKind::Site(SiteNode {
                config,
                deployment,
                nested_site_component_configs: Vec::new(),
            }),
        )
    }

    /// Create a site component under `parent`
    #[must_use]
    pub fn site_component(path: NodePath, parent: NodePath, config: ResolvedSiteComponent) -> Self {
        Self::with_kind(
            path,
            Some(parent),
            NodeKind::SiteComponent(SiteComponentNode { config }),
        )
    }

    fn with_kind(path: NodePath, parent: Option<NodePath>, kind: NodeKind) -> Self {
        Self {
            path,
            parent,
            tainted: false,
            targeted: false,
            kind,
        }
    }

    /// Unique graph key
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Local name
    #[must_use]
    pub fn identifier(&self) -> &str {
        self.path.identifier()
    }

    /// Key the node's backend is registered under
    #[must_use]
    pub fn state_key(&self) -> &str {
        self.path.state_key()
    }

    /// Variant tag
    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Project(_) => NodeType::Project,
            NodeKind::Site(_) => NodeType::Site,
            NodeKind::SiteComponent(_) => NodeType::SiteComponent,
        }
    }

    /// Path of the parent node (non-owning)
    #[must_use]
    pub fn parent(&self) -> Option<&NodePath> {
        self.parent.as_ref()
    }

    /// Variant payload
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Site payload, if this is a site
    #[must_use]
    pub fn as_site(&self) -> Option<&SiteNode> {
        match &self.kind {
            NodeKind::Site(site) => Some(site),
            _ => None,
        }
    }

    pub(crate) fn as_site_mut(&mut self) -> Option<&mut SiteNode> {
        match &mut self.kind {
            NodeKind::Site(site) => Some(site),
            _ => None,
        }
    }

    /// Component payload, if this is a site component
    #[must_use]
    pub fn as_site_component(&self) -> Option<&SiteComponentNode> {
        match &self.kind {
            NodeKind::SiteComponent(component) => Some(component),
            _ => None,
        }
    }

    /// Whether the node is its own deployable unit.
    ///
    /// Projects and sites always are; a site component only when its
    /// effective granularity is `site-component`.
    #[must_use]
    pub fn independent(&self) -> bool {
        match &self.kind {
            NodeKind::Project(_) | NodeKind::Site(_) => true,
            NodeKind::SiteComponent(component) => {
                component.config.deployment == DeploymentType::SiteComponent
            }
        }
    }

    /// Whether the node is forced to redeploy
    #[must_use]
    pub const fn tainted(&self) -> bool {
        self.tainted
    }

    /// Force (or stop forcing) redeployment
    pub fn set_tainted(&mut self, tainted: bool) {
        self.tainted = tainted;
    }

    /// Whether the node is part of the current run
    #[must_use]
    pub const fn targeted(&self) -> bool {
        self.targeted
    }

    /// Include or exclude the node from the current run
    pub fn set_targeted(&mut self, targeted: bool) {
        self.targeted = targeted;
    }

    /// Whether this deployable unit owns the state of `component`
    #[must_use]
    pub fn owns_component(&self, component: &str) -> bool {
        match &self.kind {
            NodeKind::Project(_) => false,
            NodeKind::Site(site) => site.has_nested(component),
            NodeKind::SiteComponent(c) => c.config.name == component,
        }
    }

    /// Components referenced from this unit's variables and secrets,
    /// including those of components folded into a site.
    ///
    /// # Errors
    ///
    /// Returns error naming the first malformed reference
    pub fn referenced_components(&self) -> ConfigResult<Vec<String>> {
        let mut seen = IndexSet::new();
        match &self.kind {
            NodeKind::Project(_) => {}
            NodeKind::Site(site) => {
                seen.extend(site.config.variables.list_referenced_components()?);
                seen.extend(site.config.secrets.list_referenced_components()?);
                for nested in &site.nested_site_component_configs {
                    seen.extend(nested.referenced_components()?);
                }
            }
            NodeKind::SiteComponent(component) => {
                seen.extend(component.config.referenced_components()?);
            }
        }
        Ok(seen.into_iter().collect())
    }

    /// Content hash of the node's own resolved configuration.
    ///
    /// A site hashes its own settings plus every component folded into it,
    /// but not the components that remain separate vertices.
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be encoded
    pub fn hash(&self) -> CoreResult<Hash> {
        let mut hasher = ContentHasher::new(self.node_type().as_str());
        match &self.kind {
            NodeKind::Project(project) => {
                hasher
                    .field("name", &project.name)?
                    .field("environment", &project.environment)?
                    .field("deployment", &project.deployment)?
                    .field("variables", &project.variables)?;
            }
            NodeKind::Site(site) => {
                let mut nested: Vec<&ResolvedSiteComponent> =
                    site.nested_site_component_configs.iter().collect();
                nested.sort_by(|a, b| a.name.cmp(&b.name));

                hasher
                    .field("identifier", &site.config.identifier)?
                    .field("name", &site.config.name)?
                    .field("deployment", &site.deployment)?
                    .field("variables", &site.config.variables)?
                    .field("secrets", &site.config.secrets)?
                    .field("nested", &nested)?;
            }
            NodeKind::SiteComponent(component) => {
                hasher.field("component", &component.config)?;
            }
        }
        Ok(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_config::{ComponentConfig, Variable};

    fn resolved(name: &str, deployment: DeploymentType) -> ResolvedSiteComponent {
        ResolvedSiteComponent {
            site: "site-1".to_string(),
            name: name.to_string(),
            deployment,
            definition: ComponentConfig::new(name, "./modules", "1.0.0"),
            variables: VariablesMap::new(),
            secrets: VariablesMap::new(),
        }
    }

    fn site_path() -> NodePath {
        NodePath::root("main").unwrap().child("site-1").unwrap()
    }

    fn component_node(config: ResolvedSiteComponent) -> Node {
        let path = site_path().child(&config.name).unwrap();
        Node::site_component(path, site_path(), config)
    }

    #[test]
    fn test_independence() {
        let root = NodePath::root("main").unwrap();
        let site = Node::site(site_path(), root, SiteConfig::new("site-1"), DeploymentType::Site);
        assert!(site.independent());

        assert!(!component_node(resolved("a", DeploymentType::Site)).independent());
        assert!(!component_node(resolved("a", DeploymentType::Project)).independent());
        assert!(component_node(resolved("a", DeploymentType::SiteComponent)).independent());
    }

    #[test]
    fn test_header_accessors() {
        let node = component_node(resolved("api", DeploymentType::SiteComponent));
        assert_eq!(node.identifier(), "api");
        assert_eq!(node.state_key(), "site-1/api");
        assert_eq!(node.node_type(), NodeType::SiteComponent);
        assert_eq!(node.parent(), Some(&site_path()));
        assert!(!node.tainted());
        assert!(!node.targeted());
    }

    #[test]
    fn test_set_tainted() {
        let mut node = component_node(resolved("api", DeploymentType::Site));
        node.set_tainted(true);
        assert!(node.tainted());
        node.set_tainted(false);
        assert!(!node.tainted());
    }

    #[test]
    fn test_hash_identical_config() {
        let a = component_node(resolved("api", DeploymentType::Site));
        let b = component_node(resolved("api", DeploymentType::Site));
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
    }

    #[test]
    fn test_hash_changes_with_variable_version_and_secret() {
        let base = resolved("api", DeploymentType::Site);
        let base_hash = component_node(base.clone()).hash().unwrap();

        let mut changed = base.clone();
        changed.variables.insert("x", Variable::scalar("1"));
        assert_ne!(component_node(changed).hash().unwrap(), base_hash);

        let mut changed = base.clone();
        changed.secrets.insert("token", Variable::scalar("s3cr3t"));
        assert_ne!(component_node(changed).hash().unwrap(), base_hash);

        let mut changed = base.clone();
        changed.definition.version = "1.0.1".to_string();
        assert_ne!(component_node(changed).hash().unwrap(), base_hash);

        let mut changed = base;
        changed.definition.source = "git::elsewhere".to_string();
        assert_ne!(component_node(changed).hash().unwrap(), base_hash);
    }

    #[test]
    fn test_site_hash_covers_nested_order_independent() {
        let root = NodePath::root("main").unwrap();
        let mut left = Node::site(site_path(), root.clone(), SiteConfig::new("site-1"), DeploymentType::Site);
        let mut right = left.clone();
        let empty_hash = left.hash().unwrap();

        let site = left.as_site_mut().unwrap();
        site.nested_site_component_configs.push(resolved("a", DeploymentType::Site));
        site.nested_site_component_configs.push(resolved("b", DeploymentType::Site));

        let site = right.as_site_mut().unwrap();
        site.nested_site_component_configs.push(resolved("b", DeploymentType::Site));
        site.nested_site_component_configs.push(resolved("a", DeploymentType::Site));

        assert_ne!(left.hash().unwrap(), empty_hash);
        assert_eq!(left.hash().unwrap(), right.hash().unwrap());
    }

    #[test]
    fn test_referenced_components_site_includes_nested() {
        let root = NodePath::root("main").unwrap();
        let mut node = Node::site(site_path(), root, SiteConfig::new("site-1"), DeploymentType::Site);
        let mut nested = resolved("bar", DeploymentType::Site);
        nested.variables.insert("foo_url", Variable::scalar("${component.foo.url}"));
        node.as_site_mut().unwrap().nested_site_component_configs.push(nested);

        assert_eq!(node.referenced_components().unwrap(), vec!["foo"]);
        assert!(node.owns_component("bar"));
        assert!(!node.owns_component("foo"));
    }
}
