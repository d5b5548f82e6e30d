//! Core error types for CAIRN.

use crate::hash::HashError;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Value could not be encoded for hashing
    #[error("Invalid encoding: {reason}")]
    InvalidEncoding {
        /// Encoder message
        reason: String,
    },

    /// Invalid hash format
    #[error(transparent)]
    InvalidHash(#[from] HashError),

    /// Identifier is empty or contains the path separator
    #[error("Invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        /// Offending identifier
        identifier: String,
        /// Why it was rejected
        reason: String,
    },
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidEncoding {
            reason: err.to_string(),
        }
    }
}
