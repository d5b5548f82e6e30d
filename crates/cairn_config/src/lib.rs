//! CAIRN Configuration
//!
//! The fully resolved configuration snapshot consumed by the graph engine:
//! a project, its sites, the global component registry, and the variable
//! trees attached to every site and site component.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod model;
pub mod variable;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    ComponentConfig, DeploymentType, ProjectConfig, ResolvedSiteComponent, SiteComponentConfig,
    SiteConfig,
};
pub use variable::{
    Variable, VariableType, VariablesMap, interpolate_component_refs, merge_variables_maps,
};
