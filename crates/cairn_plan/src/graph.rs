//! Deployment graph.
//!
//! An owned directed graph keyed by [`NodePath`]. Vertices live in an
//! insertion-ordered arena; edges are kept twice, as an adjacency map
//! (parent → children) and its inverse (child → predecessors), so both
//! directions can be queried without scanning.

use crate::error::{GraphError, GraphResult};
use crate::node::{Node, NodeType};
use cairn_core::NodePath;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::VecDeque;

/// A path through the graph, source first
pub type Route = Vec<NodePath>;

/// A directed edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    /// Source vertex
    pub source: NodePath,
    /// Target vertex
    pub target: NodePath,
}

impl Edge {
    /// Create a new edge
    #[must_use]
    pub fn new(source: NodePath, target: NodePath) -> Self {
        Self { source, target }
    }
}

/// Directed acyclic graph of deployment nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    vertices: IndexMap<NodePath, Node>,
    adjacency: IndexMap<NodePath, IndexSet<NodePath>>,
    predecessors: IndexMap<NodePath, IndexSet<NodePath>>,
}

impl Graph {
    /// Create a new empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex
    ///
    /// # Errors
    ///
    /// Returns error if a vertex with the same path exists
    pub fn add_vertex(&mut self, node: Node) -> GraphResult<()> {
        let path = node.path().clone();
        if self.vertices.contains_key(&path) {
            return Err(GraphError::VertexExists {
                path: path.to_string(),
            });
        }

        self.adjacency.insert(path.clone(), IndexSet::new());
        self.predecessors.insert(path.clone(), IndexSet::new());
        self.vertices.insert(path, node);
        Ok(())
    }

    /// Remove a vertex together with every edge touching it
    ///
    /// # Errors
    ///
    /// Returns error if the vertex does not exist
    pub fn remove_vertex(&mut self, path: &str) -> GraphResult<Node> {
        let node = self
            .vertices
            .shift_remove(path)
            .ok_or_else(|| not_found(path))?;

        for child in self.adjacency.shift_remove(path).unwrap_or_default() {
            if let Some(preds) = self.predecessors.get_mut(&child) {
                preds.shift_remove(path);
            }
        }
        for pred in self.predecessors.shift_remove(path).unwrap_or_default() {
            if let Some(children) = self.adjacency.get_mut(&pred) {
                children.shift_remove(path);
            }
        }

        Ok(node)
    }

    /// Add an edge. Adding an existing edge is a no-op.
    ///
    /// # Errors
    ///
    /// Returns error if either vertex is missing or the edge would close a cycle
    pub fn add_edge(&mut self, source: &str, target: &str) -> GraphResult<()> {
        let source_key = self.key(source)?;
        let target_key = self.key(target)?;

        if self.has_edge(source, target) {
            return Ok(());
        }
        if source == target || self.reaches(target, source) {
            return Err(GraphError::Cycle {
                from: source.to_string(),
                to: target.to_string(),
            });
        }

        if let Some(children) = self.adjacency.get_mut(source) {
            children.insert(target_key);
        }
        if let Some(preds) = self.predecessors.get_mut(target) {
            preds.insert(source_key);
        }
        Ok(())
    }

    /// Remove an edge
    ///
    /// # Errors
    ///
    /// Returns error if the edge does not exist
    pub fn remove_edge(&mut self, source: &str, target: &str) -> GraphResult<()> {
        let removed = self
            .adjacency
            .get_mut(source)
            .is_some_and(|children| children.shift_remove(target));
        if !removed {
            return Err(GraphError::EdgeNotFound {
                from: source.to_string(),
                to: target.to_string(),
            });
        }
        if let Some(preds) = self.predecessors.get_mut(target) {
            preds.shift_remove(source);
        }
        Ok(())
    }

    /// Whether `source → target` exists
    #[must_use]
    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.adjacency
            .get(source)
            .is_some_and(|children| children.contains(target))
    }

    fn key(&self, path: &str) -> GraphResult<NodePath> {
        self.vertices
            .get_key_value(path)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| not_found(path))
    }

    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut visited: IndexSet<&str> = IndexSet::new();
        let mut stack = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(children) = self.adjacency.get(current) {
                stack.extend(children.iter().map(NodePath::as_str));
            }
        }
        false
    }

    /// Get a vertex
    #[must_use]
    pub fn vertex(&self, path: &str) -> Option<&Node> {
        self.vertices.get(path)
    }

    /// Get a vertex mutably
    pub fn vertex_mut(&mut self, path: &str) -> Option<&mut Node> {
        self.vertices.get_mut(path)
    }

    /// Whether a vertex exists
    #[must_use]
    pub fn vertex_exists(&self, path: &str) -> bool {
        self.vertices.contains_key(path)
    }

    /// All vertices in insertion order
    pub fn vertices(&self) -> impl Iterator<Item = &Node> {
        self.vertices.values()
    }

    /// All vertices, mutably
    pub fn vertices_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.vertices.values_mut()
    }

    /// All edges, grouped by source in insertion order
    #[must_use]
    pub fn edges(&self) -> Vec<Edge> {
        self.adjacency
            .iter()
            .flat_map(|(source, children)| {
                children
                    .iter()
                    .map(move |target| Edge::new(source.clone(), target.clone()))
            })
            .collect()
    }

    /// Vertex → children
    #[must_use]
    pub fn adjacency_map(&self) -> &IndexMap<NodePath, IndexSet<NodePath>> {
        &self.adjacency
    }

    /// Vertex → predecessors
    #[must_use]
    pub fn predecessor_map(&self) -> &IndexMap<NodePath, IndexSet<NodePath>> {
        &self.predecessors
    }

    /// Children of a vertex (empty if unknown)
    #[must_use]
    pub fn children(&self, path: &str) -> Vec<NodePath> {
        self.adjacency
            .get(path)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Predecessors of a vertex (empty if unknown)
    #[must_use]
    pub fn predecessors(&self, path: &str) -> Vec<NodePath> {
        self.predecessors
            .get(path)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Vertices of one type, in insertion order
    #[must_use]
    pub fn vertices_by_type(&self, node_type: NodeType) -> Vec<&Node> {
        self.vertices
            .values()
            .filter(|node| node.node_type() == node_type)
            .collect()
    }

    /// First vertex whose identifier matches
    #[must_use]
    pub fn vertex_by_identifier(&self, identifier: &str) -> Option<&Node> {
        self.vertices
            .values()
            .find(|node| node.identifier() == identifier)
    }

    /// The project vertex
    #[must_use]
    pub fn root(&self) -> Option<&Node> {
        self.vertices
            .values()
            .find(|node| node.node_type() == NodeType::Project)
    }

    /// Vertices without predecessors
    #[must_use]
    pub fn sources(&self) -> Vec<NodePath> {
        self.predecessors
            .iter()
            .filter(|(_, preds)| preds.is_empty())
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Get total vertex count
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get total edge count
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(IndexSet::len).sum()
    }

    /// Check if the graph is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Breadth-first order from the sources, followed by any vertex not
    /// reachable from them. Every vertex appears exactly once.
    #[must_use]
    pub fn bfs_order(&self) -> Vec<NodePath> {
        let mut seen: IndexSet<NodePath> = IndexSet::new();
        let mut queue: VecDeque<NodePath> = self.sources().into();
        for source in &queue {
            seen.insert(source.clone());
        }

        while let Some(current) = queue.pop_front() {
            for child in self.adjacency.get(&current).into_iter().flatten() {
                if seen.insert(child.clone()) {
                    queue.push_back(child.clone());
                }
            }
        }

        for path in self.vertices.keys() {
            seen.insert(path.clone());
        }
        seen.into_iter().collect()
    }

    /// Every vertex reachable from `path`, excluding `path` itself, in
    /// breadth-first order
    #[must_use]
    pub fn descendants(&self, path: &str) -> Vec<NodePath> {
        let mut seen: IndexSet<NodePath> = IndexSet::new();
        let mut queue: VecDeque<&NodePath> = self.adjacency.get(path).into_iter().flatten().collect();

        while let Some(current) = queue.pop_front() {
            if current == path || !seen.insert(current.clone()) {
                continue;
            }
            queue.extend(self.adjacency.get(current).into_iter().flatten());
        }
        seen.into_iter().collect()
    }

    /// Every distinct path from `source` to `target` following predecessor
    /// edges. A vertex has exactly one route to itself.
    ///
    /// # Errors
    ///
    /// Returns error if either vertex does not exist
    pub fn routes(&self, source: &str, target: &str) -> GraphResult<Vec<Route>> {
        let source_key = self.key(source)?;
        self.key(target)?;

        let mut routes = Vec::new();
        let mut current = vec![source_key];
        self.collect_routes(target, &mut current, &mut routes);
        Ok(routes)
    }

    fn collect_routes(&self, target: &str, current: &mut Route, routes: &mut Vec<Route>) {
        let Some(last) = current.last().cloned() else {
            return;
        };
        if last == target {
            routes.push(current.clone());
            return;
        }
        for pred in self.predecessors.get(&last).into_iter().flatten() {
            current.push(pred.clone());
            self.collect_routes(target, current, routes);
            current.pop();
        }
    }

    /// Topological layers: every vertex appears in the first batch after all
    /// of its predecessors. Vertices within a batch keep insertion order.
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<NodePath>> {
        let mut indegree: IndexMap<&NodePath, usize> = self
            .predecessors
            .iter()
            .map(|(path, preds)| (path, preds.len()))
            .collect();

        let mut batches = Vec::new();
        let mut ready: Vec<&NodePath> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(path, _)| *path)
            .collect();

        while !ready.is_empty() {
            let mut next = Vec::new();
            for path in &ready {
                for child in self.adjacency.get(*path).into_iter().flatten() {
                    if let Some(degree) = indegree.get_mut(child) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(child);
                        }
                    }
                }
            }
            batches.push(ready.iter().map(|p| (*p).clone()).collect());
            next.sort_by_key(|p| self.vertices.get_index_of(*p));
            ready = next;
        }

        batches
    }

    /// Targeted sites plus every vertex reachable from them, in graph order
    #[must_use]
    pub fn targeted_paths(&self) -> Vec<NodePath> {
        let mut selected: IndexSet<NodePath> = IndexSet::new();
        for node in self.vertices_by_type(NodeType::Site) {
            if node.targeted() {
                selected.insert(node.path().clone());
                selected.extend(self.descendants(node.path().as_str()));
            }
        }

        self.vertices
            .keys()
            .filter(|path| selected.contains(*path))
            .cloned()
            .collect()
    }
}

fn not_found(path: &str) -> GraphError {
    GraphError::VertexNotFound {
        path: path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ProjectNode;
    use cairn_config::{DeploymentType, SiteConfig, VariablesMap};

    fn root() -> NodePath {
        NodePath::root("main").unwrap()
    }

    fn project_node() -> Node {
        Node::project(
            root(),
            ProjectNode {
                name: "main".to_string(),
                environment: None,
                deployment: DeploymentType::Site,
                variables: VariablesMap::new(),
            },
        )
    }

    fn site_node(id: &str) -> Node {
        Node::site(root().child(id).unwrap(), root(), SiteConfig::new(id), DeploymentType::Site)
    }

    fn diamond() -> Graph {
        // main -> a, main -> b, a -> c, b -> c
        let mut graph = Graph::new();
        graph.add_vertex(project_node()).unwrap();
        for id in ["a", "b", "c"] {
            graph.add_vertex(site_node(id)).unwrap();
        }
        graph.add_edge("main", "main/a").unwrap();
        graph.add_edge("main", "main/b").unwrap();
        graph.add_edge("main/a", "main/c").unwrap();
        graph.add_edge("main/b", "main/c").unwrap();
        graph
    }

    #[test]
    fn test_graph_new() {
        let graph = Graph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.vertex_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.root().is_none());
    }

    #[test]
    fn test_add_vertex_duplicate() {
        let mut graph = Graph::new();
        graph.add_vertex(project_node()).unwrap();
        assert_eq!(
            graph.add_vertex(project_node()),
            Err(GraphError::VertexExists {
                path: "main".to_string()
            })
        );
    }

    #[test]
    fn test_add_edge_idempotent() {
        let mut graph = diamond();
        graph.add_edge("main", "main/a").unwrap();
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn test_add_edge_rejects_cycle() {
        let mut graph = diamond();
        assert!(matches!(graph.add_edge("main/c", "main"), Err(GraphError::Cycle { .. })));
        assert!(matches!(graph.add_edge("main/a", "main/a"), Err(GraphError::Cycle { .. })));
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn test_add_edge_missing_vertex() {
        let mut graph = diamond();
        assert!(matches!(
            graph.add_edge("main", "main/zzz"),
            Err(GraphError::VertexNotFound { path }) if path == "main/zzz"
        ));
    }

    #[test]
    fn test_remove_edge() {
        let mut graph = diamond();
        graph.remove_edge("main/a", "main/c").unwrap();
        assert!(!graph.has_edge("main/a", "main/c"));
        assert_eq!(graph.predecessors("main/c"), vec![NodePath::root("main").unwrap().child("b").unwrap()]);
        assert!(matches!(
            graph.remove_edge("main/a", "main/c"),
            Err(GraphError::EdgeNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_vertex_drops_incident_edges() {
        let mut graph = diamond();
        graph.remove_vertex("main/a").unwrap();
        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert!(!graph.adjacency_map().contains_key("main/a"));
        assert!(graph.predecessor_map().values().all(|p| !p.contains("main/a")));
        assert!(graph.remove_vertex("main/a").is_err());
    }

    #[test]
    fn test_routes_diamond() {
        let graph = diamond();
        let routes = graph.routes("main/c", "main").unwrap();
        let rendered: Vec<Vec<&str>> = routes
            .iter()
            .map(|r| r.iter().map(NodePath::as_str).collect())
            .collect();
        assert_eq!(
            rendered,
            vec![vec!["main/c", "main/a", "main"], vec!["main/c", "main/b", "main"]]
        );
    }

    #[test]
    fn test_routes_self_and_unreachable() {
        let graph = diamond();
        assert_eq!(graph.routes("main/a", "main/a").unwrap(), vec![vec![root().child("a").unwrap()]]);
        assert!(graph.routes("main", "main/c").unwrap().is_empty());
        assert!(graph.routes("main/x", "main").is_err());
    }

    #[test]
    fn test_batches() {
        let graph = diamond();
        let batches = graph.batches();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], vec![root()]);
        assert_eq!(batches[1], vec![root().child("a").unwrap(), root().child("b").unwrap()]);
        assert_eq!(batches[2], vec![root().child("c").unwrap()]);
    }

    #[test]
    fn test_bfs_order_and_descendants() {
        let graph = diamond();
        let order: Vec<String> = graph.bfs_order().iter().map(ToString::to_string).collect();
        assert_eq!(order, vec!["main", "main/a", "main/b", "main/c"]);
        assert_eq!(graph.descendants("main/a"), vec![root().child("c").unwrap()]);
        assert_eq!(graph.descendants("main").len(), 3);
    }

    #[test]
    fn test_lookup_by_type_and_identifier() {
        let graph = diamond();
        assert_eq!(graph.vertices_by_type(NodeType::Site).len(), 3);
        assert_eq!(graph.vertex_by_identifier("b").map(Node::path), Some(&root().child("b").unwrap()));
        assert_eq!(graph.root().map(Node::identifier), Some("main"));
    }

    #[test]
    fn test_targeted_paths() {
        let mut graph = diamond();
        graph.vertex_mut("main/a").unwrap().set_targeted(true);
        let targeted: Vec<String> = graph.targeted_paths().iter().map(ToString::to_string).collect();
        assert_eq!(targeted, vec!["main/a", "main/c"]);
    }
}
