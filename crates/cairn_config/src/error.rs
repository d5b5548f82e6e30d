//! Configuration-shape errors.

use cairn_core::CoreError;

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors in the shape of a resolved configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A `${component...}` reference without both a component and an output
    #[error(
        "invalid variable '{text}'; a ${{component...}} variable has to consist of 2 parts: component-name.output-name"
    )]
    MalformedReference {
        /// The reference text as written
        text: String,
    },

    /// Two global components share a name
    #[error("component {name} is duplicate")]
    DuplicateComponent {
        /// Component name
        name: String,
    },

    /// Two sites share an identifier
    #[error("site {identifier} is duplicate")]
    DuplicateSite {
        /// Site identifier
        identifier: String,
    },

    /// A site lists the same component twice
    #[error("component {component} is listed more than once in site {site}")]
    DuplicateSiteComponent {
        /// Site identifier
        site: String,
        /// Component name
        component: String,
    },

    /// A site references a component absent from the global registry
    #[error("component {component} referenced by site {site} does not exist in global components")]
    MissingComponent {
        /// Component name
        component: String,
        /// Referencing site identifier
        site: String,
    },

    /// Invalid identifier or encoding
    #[error(transparent)]
    Core(#[from] CoreError),
}
