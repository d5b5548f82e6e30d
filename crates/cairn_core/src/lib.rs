//! CAIRN Core Types
//!
//! This crate contains pure types and logic with no I/O.
//! Node paths and content hashes are stable across platforms and runs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod path;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use hash::{ContentHasher, Hash, HashError};
pub use path::{NodePath, PATH_SEPARATOR};
