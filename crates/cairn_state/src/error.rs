//! State errors.

use cairn_config::ConfigError;
use cairn_core::CoreError;

/// State result type
pub type StateResult<T> = Result<T, StateError>;

/// Errors from backends and hash stores
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// A backend could not render its configuration
    #[error("backend for {key} failed: {reason}")]
    Backend {
        /// State key of the unit
        key: String,
        /// Backend message
        reason: String,
    },

    /// A backend is already registered under this key
    #[error("backend already registered for {key}")]
    AlreadyRegistered {
        /// Duplicate key
        key: String,
    },

    /// Reading or writing the hash store failed
    #[error("hash store I/O error at {path}: {reason}")]
    Io {
        /// Store location
        path: String,
        /// OS message
        reason: String,
    },

    /// The hash store holds data that does not decode
    #[error("hash store is corrupt: {reason}")]
    Corrupt {
        /// Decoder message
        reason: String,
    },
}

/// Errors from change detection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChangeError {
    /// The caller cancelled the check
    #[error("change detection cancelled for {path}")]
    Cancelled {
        /// Node being checked
        path: String,
    },

    /// The hash store did not answer in time
    #[error("hash lookup for {path} timed out after {timeout_ms}ms")]
    Timeout {
        /// Node being checked
        path: String,
        /// Configured limit
        timeout_ms: u64,
    },

    /// The hash store failed
    #[error(transparent)]
    Store(#[from] StateError),

    /// The node could not be hashed
    #[error(transparent)]
    Hash(#[from] CoreError),
}

/// Errors from remote-state routing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// The owning unit has no registered backend
    #[error("missing remote state for {identifier} (state key {key})")]
    MissingBackend {
        /// Identifier of the owning unit
        identifier: String,
        /// Registry key that was looked up
        key: String,
    },

    /// No deployable unit owns the referenced component
    #[error("component {component} referenced by {referenced_by} is not deployed anywhere")]
    UnknownComponent {
        /// Referenced component
        component: String,
        /// Path of the referencing unit
        referenced_by: String,
    },

    /// The node being routed is not in the graph
    #[error("vertex not found: {path}")]
    VertexNotFound {
        /// Requested path
        path: String,
    },

    /// A reference could not be parsed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A backend failed to render
    #[error(transparent)]
    State(#[from] StateError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_backend_names_identifier() {
        let err = RouteError::MissingBackend {
            identifier: "component-a".to_string(),
            key: "site-2/component-a".to_string(),
        };
        assert!(err.to_string().contains("missing remote state for component-a"));
    }

    #[test]
    fn test_change_error_from_state() {
        let err: ChangeError = StateError::Corrupt {
            reason: "bad hex".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "hash store is corrupt: bad hex");
    }
}
