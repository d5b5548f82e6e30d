//! Structural checks for the deployment graph.

use crate::error::{GraphError, GraphResult};
use crate::graph::Graph;
use crate::node::NodeType;
use indexmap::IndexSet;

/// A single failed structural check
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No project vertex
    #[error("graph has no project root")]
    MissingRoot,

    /// More than one vertex without predecessors
    #[error("graph has multiple roots: {}", .roots.join(", "))]
    MultipleRoots {
        /// Vertices without predecessors
        roots: Vec<String>,
    },

    /// Vertices on a cycle
    #[error("cycle detected involving: {}", .paths.join(", "))]
    Cycle {
        /// Vertices that could not be ordered
        paths: Vec<String>,
    },

    /// Vertices the root cannot reach
    #[error("unreachable vertices: {}", .paths.join(", "))]
    Unreachable {
        /// Unreachable vertices
        paths: Vec<String>,
    },

    /// A vertex does not hang off its recorded parent
    #[error("{path} is not a proper tree node: {reason}")]
    NotTree {
        /// Offending vertex
        path: String,
        /// What was wrong
        reason: String,
    },

    /// A vertex survived reduction without being deployable on its own
    #[error("{path} is not independently deployable")]
    NotIndependent {
        /// Offending vertex
        path: String,
    },
}

/// Validator for graph properties
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    /// Require every vertex to be reachable from the root
    pub require_reachable: bool,
}

impl Validator {
    /// Create a new validator
    #[must_use]
    pub fn new() -> Self {
        Self {
            require_reachable: true,
        }
    }

    /// Set whether every vertex must be reachable from the root
    #[must_use]
    pub fn with_require_reachable(mut self, require: bool) -> Self {
        self.require_reachable = require;
        self
    }

    /// Checks shared by every stage: one root, acyclic, reachable.
    ///
    /// # Errors
    ///
    /// Returns every failed check
    pub fn validate(&self, graph: &Graph) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if graph.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.check_root(graph) {
            errors.push(e);
        }
        if let Err(e) = self.check_acyclic(graph) {
            errors.push(e);
        }
        if self.require_reachable {
            if let Err(e) = self.check_reachable(graph) {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate the freshly built tree: shared checks plus every non-root
    /// vertex having exactly one predecessor, its recorded parent.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Invalid`] listing every failed check
    pub fn validate_tree(&self, graph: &Graph) -> GraphResult<()> {
        let mut errors = self.validate(graph).err().unwrap_or_default();

        for node in graph.vertices() {
            let preds = graph.predecessors(node.path().as_str());
            let reason = match (node.parent(), preds.as_slice()) {
                (None, []) => None,
                (None, _) => Some("root has predecessors".to_string()),
                (Some(parent), [only]) if only == parent => match (graph.vertex(parent.as_str()), node.node_type()) {
                    (Some(p), NodeType::Site) if p.node_type() != NodeType::Project => {
                        Some("site parent is not the project".to_string())
                    }
                    (Some(p), NodeType::SiteComponent) if p.node_type() != NodeType::Site => {
                        Some("component parent is not a site".to_string())
                    }
                    (None, _) => Some(format!("parent {} is missing", parent)),
                    _ => None,
                },
                (Some(_), preds) => Some(format!("expected one predecessor, found {}", preds.len())),
            };

            if let Some(reason) = reason {
                errors.push(ValidationError::NotTree {
                    path: node.path().to_string(),
                    reason,
                });
            }
        }

        into_result(errors)
    }

    /// Validate a reduced graph: shared checks plus every vertex independent.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Invalid`] listing every failed check
    pub fn validate_reduced(&self, graph: &Graph) -> GraphResult<()> {
        let mut errors = self.validate(graph).err().unwrap_or_default();

        errors.extend(
            graph
                .vertices()
                .filter(|node| !node.independent())
                .map(|node| ValidationError::NotIndependent {
                    path: node.path().to_string(),
                }),
        );

        into_result(errors)
    }

    fn check_root(&self, graph: &Graph) -> Result<(), ValidationError> {
        if graph.root().is_none() {
            return Err(ValidationError::MissingRoot);
        }
        let sources = graph.sources();
        if sources.len() > 1 {
            return Err(ValidationError::MultipleRoots {
                roots: sources.iter().map(ToString::to_string).collect(),
            });
        }
        Ok(())
    }

    fn check_acyclic(&self, graph: &Graph) -> Result<(), ValidationError> {
        let ordered: IndexSet<_> = graph.batches().into_iter().flatten().collect();
        if ordered.len() == graph.vertex_count() {
            return Ok(());
        }

        Err(ValidationError::Cycle {
            paths: graph
                .vertices()
                .map(|node| node.path())
                .filter(|path| !ordered.contains(*path))
                .map(ToString::to_string)
                .collect(),
        })
    }

    fn check_reachable(&self, graph: &Graph) -> Result<(), ValidationError> {
        let Some(root) = graph.root() else {
            return Ok(());
        };

        let mut reachable: IndexSet<_> = graph.descendants(root.path().as_str()).into_iter().collect();
        reachable.insert(root.path().clone());

        let unreachable: Vec<String> = graph
            .vertices()
            .map(|node| node.path())
            .filter(|path| !reachable.contains(*path))
            .map(ToString::to_string)
            .collect();

        if unreachable.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Unreachable { paths: unreachable })
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

fn into_result(errors: Vec<ValidationError>) -> GraphResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(GraphError::Invalid {
            reasons: errors.iter().map(ToString::to_string).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, ProjectNode};
    use cairn_config::{DeploymentType, SiteConfig, VariablesMap};
    use cairn_core::NodePath;

    fn root() -> NodePath {
        NodePath::root("main").unwrap()
    }

    fn tree() -> Graph {
        let mut graph = Graph::new();
        graph
            .add_vertex(Node::project(
                root(),
                ProjectNode {
                    name: "main".to_string(),
                    environment: None,
                    deployment: DeploymentType::Site,
                    variables: VariablesMap::new(),
                },
            ))
            .unwrap();
        for id in ["site-1", "site-2"] {
            let path = root().child(id).unwrap();
            graph
                .add_vertex(Node::site(path.clone(), root(), SiteConfig::new(id), DeploymentType::Site))
                .unwrap();
            graph.add_edge("main", path.as_str()).unwrap();
        }
        graph
    }

    #[test]
    fn test_validator_new() {
        let validator = Validator::new();
        assert!(validator.require_reachable);
        assert!(!validator.with_require_reachable(false).require_reachable);
    }

    #[test]
    fn test_validate_empty_graph() {
        assert!(Validator::new().validate(&Graph::new()).is_ok());
    }

    #[test]
    fn test_validate_tree_ok() {
        let graph = tree();
        assert!(Validator::new().validate_tree(&graph).is_ok());
        assert!(Validator::new().validate_reduced(&graph).is_ok());
    }

    #[test]
    fn test_validate_detects_unreachable_and_multiple_roots() {
        let mut graph = tree();
        graph.remove_edge("main", "main/site-2").unwrap();

        let errors = Validator::new().validate(&graph).unwrap_err();
        assert!(errors.contains(&ValidationError::MultipleRoots {
            roots: vec!["main".to_string(), "main/site-2".to_string()]
        }));
        assert!(errors.contains(&ValidationError::Unreachable {
            paths: vec!["main/site-2".to_string()]
        }));
    }

    #[test]
    fn test_validate_tree_rejects_extra_predecessor() {
        let mut graph = tree();
        graph.add_edge("main/site-1", "main/site-2").unwrap();

        let err = Validator::new().validate_tree(&graph).unwrap_err();
        assert!(matches!(err, GraphError::Invalid { ref reasons } if reasons.len() == 1));
        assert!(err.to_string().contains("main/site-2 is not a proper tree node"));
    }

    #[test]
    fn test_validate_missing_root() {
        let mut graph = tree();
        graph.remove_vertex("main").unwrap();
        let errors = Validator::new().validate(&graph).unwrap_err();
        assert!(errors.contains(&ValidationError::MissingRoot));
    }
}
