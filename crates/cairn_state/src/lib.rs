//! CAIRN State
//!
//! Everything that looks outside the in-memory graph: recorded configuration
//! hashes for change detection, state backends per deployable unit, and the
//! routing of component references to the remote state that serves them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod change;
pub mod error;
pub mod registry;
pub mod router;
pub mod store;

pub use change::{ChangeDetector, DetectorConfig};
pub use error::{ChangeError, RouteError, StateError, StateResult};
pub use registry::{Backend, LocalBackend, RemoteBackend, StateRegistry, data_source_name};
pub use router::{RemoteStateLink, Router};
pub use store::{FsHashStore, HashStore, MemoryHashStore};
