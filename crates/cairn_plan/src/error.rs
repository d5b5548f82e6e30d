//! Graph errors.

use cairn_config::ConfigError;
use cairn_core::CoreError;

/// Graph result type
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised while building or manipulating the deployment graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// No vertex with this path
    #[error("vertex not found: {path}")]
    VertexNotFound {
        /// Requested path
        path: String,
    },

    /// A vertex with this path already exists
    #[error("vertex already exists: {path}")]
    VertexExists {
        /// Duplicate path
        path: String,
    },

    /// No edge between the two vertices
    #[error("edge not found: {from} -> {to}")]
    EdgeNotFound {
        /// Source path
        from: String,
        /// Target path
        to: String,
    },

    /// Edge would close a cycle
    #[error("adding edge {from} -> {to} would create a cycle")]
    Cycle {
        /// Source path
        from: String,
        /// Target path
        to: String,
    },

    /// Targeted site is not in the graph
    #[error("site {identifier} does not exist")]
    SiteNotFound {
        /// Requested site identifier
        identifier: String,
    },

    /// The graph is not in the shape reduction expects. This is a bug in
    /// graph construction, not a user error.
    #[error("graph invariant violated at {path}: {reason}")]
    InvariantViolation {
        /// Offending vertex
        path: String,
        /// What was expected
        reason: String,
    },

    /// Structural validation failed
    #[error("invalid graph: {}", .reasons.join("; "))]
    Invalid {
        /// One entry per failed check
        reasons: Vec<String>,
    },

    /// Configuration shape error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid identifier or encoding
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl GraphError {
    /// Whether the error is a programming error rather than a user error
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}
