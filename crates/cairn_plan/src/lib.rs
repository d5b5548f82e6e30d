//! CAIRN Planner
//!
//! Compiles a resolved project configuration into the deployment graph:
//! a Project → Site → SiteComponent tree that is then reduced so that every
//! remaining vertex is an independently deployable unit.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod deployment;
pub mod error;
pub mod graph;
pub mod node;
pub mod reduce;
pub mod target;
pub mod taint;
pub mod validate;

pub use builder::{GraphBuilder, GraphOptions};
pub use deployment::to_deployment_graph;
pub use error::{GraphError, GraphResult};
pub use graph::{Edge, Graph, Route};
pub use node::{Node, NodeKind, NodeType, ProjectNode, SiteComponentNode, SiteNode};
pub use reduce::{ReductionReport, collapse, reduce};
pub use target::target_sites;
pub use taint::propagate_taint;
pub use validate::{ValidationError, Validator};
