//! Resolved configuration model.
//!
//! The loader (out of scope here) produces a [`ProjectConfig`] snapshot with
//! every include and plugin section already applied. The graph builder only
//! reads it.

use crate::error::{ConfigError, ConfigResult};
use crate::variable::{VariablesMap, merge_variables_maps};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Deployment granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentType {
    /// Everything is deployed as part of its site; sites merge into one unit per site
    Project,
    /// Each site is one deployable unit containing its components
    #[default]
    Site,
    /// Each site component is its own deployable unit
    SiteComponent,
}

impl DeploymentType {
    /// Resolve the effective granularity: the component override wins, then
    /// the site override, then the global default.
    #[must_use]
    pub fn resolve(global: Self, site: Option<Self>, component: Option<Self>) -> Self {
        component.or(site).unwrap_or(global)
    }

    /// Kebab-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Site => "site",
            Self::SiteComponent => "site-component",
        }
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(Self::Project),
            "site" => Ok(Self::Site),
            "site-component" => Ok(Self::SiteComponent),
            other => Err(format!("unknown deployment type: {}", other)),
        }
    }
}

/// Global component definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Component name, unique across the project
    pub name: String,
    /// Module source (path, registry or git URL)
    pub source: String,
    /// Version or git ref
    pub version: String,
    /// Branch the version was taken from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Plugins rendering this component
    #[serde(default)]
    pub integrations: Vec<String>,
}

impl ComponentConfig {
    /// Create a component definition
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            version: version.into(),
            branch: None,
            integrations: Vec::new(),
        }
    }

    /// Set integrations
    #[must_use]
    pub fn with_integrations(mut self, integrations: Vec<String>) -> Self {
        self.integrations = integrations;
        self
    }
}

/// A component as listed in a site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteComponentConfig {
    /// Name of the global component
    pub name: String,
    /// Granularity override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentType>,
    /// Component variables
    #[serde(default)]
    pub variables: VariablesMap,
    /// Component secrets
    #[serde(default)]
    pub secrets: VariablesMap,
}

impl SiteComponentConfig {
    /// Create an entry without overrides or variables
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deployment: None,
            variables: VariablesMap::new(),
            secrets: VariablesMap::new(),
        }
    }

    /// Override the granularity
    #[must_use]
    pub fn with_deployment(mut self, deployment: DeploymentType) -> Self {
        self.deployment = Some(deployment);
        self
    }

    /// Set variables
    #[must_use]
    pub fn with_variables(mut self, variables: VariablesMap) -> Self {
        self.variables = variables;
        self
    }

    /// Set secrets
    #[must_use]
    pub fn with_secrets(mut self, secrets: VariablesMap) -> Self {
        self.secrets = secrets;
        self
    }
}

/// A site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Stable identifier, unique across the project
    pub identifier: String,
    /// Granularity override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentType>,
    /// Site variables
    #[serde(default)]
    pub variables: VariablesMap,
    /// Site secrets
    #[serde(default)]
    pub secrets: VariablesMap,
    /// Components deployed into this site
    #[serde(default)]
    pub components: Vec<SiteComponentConfig>,
}

impl SiteConfig {
    /// Create an empty site
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            name: identifier.clone(),
            identifier,
            deployment: None,
            variables: VariablesMap::new(),
            secrets: VariablesMap::new(),
            components: Vec::new(),
        }
    }

    /// Override the granularity
    #[must_use]
    pub fn with_deployment(mut self, deployment: DeploymentType) -> Self {
        self.deployment = Some(deployment);
        self
    }

    /// Set variables
    #[must_use]
    pub fn with_variables(mut self, variables: VariablesMap) -> Self {
        self.variables = variables;
        self
    }

    /// Add a component
    #[must_use]
    pub fn with_component(mut self, component: SiteComponentConfig) -> Self {
        self.components.push(component);
        self
    }
}

/// The resolved project configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name, the root path segment
    pub name: String,
    /// Deployment environment label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Global granularity
    #[serde(default)]
    pub deployment: DeploymentType,
    /// Variables every site component inherits
    #[serde(default)]
    pub variables: VariablesMap,
    /// Global component registry
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    /// Sites
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

impl ProjectConfig {
    /// Create an empty project
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            environment: None,
            deployment: DeploymentType::default(),
            variables: VariablesMap::new(),
            components: Vec::new(),
            sites: Vec::new(),
        }
    }

    /// Set the global granularity
    #[must_use]
    pub fn with_deployment(mut self, deployment: DeploymentType) -> Self {
        self.deployment = deployment;
        self
    }

    /// Register a global component
    #[must_use]
    pub fn with_component(mut self, component: ComponentConfig) -> Self {
        self.components.push(component);
        self
    }

    /// Add a site
    #[must_use]
    pub fn with_site(mut self, site: SiteConfig) -> Self {
        self.sites.push(site);
        self
    }

    /// Look up a global component
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&ComponentConfig> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Look up a site
    #[must_use]
    pub fn site(&self, identifier: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.identifier == identifier)
    }

    /// Check names are unique where they have to be.
    ///
    /// # Errors
    ///
    /// Returns the first duplicate found
    pub fn validate(&self) -> ConfigResult<()> {
        let mut components = IndexSet::new();
        for component in &self.components {
            if !components.insert(component.name.as_str()) {
                return Err(ConfigError::DuplicateComponent {
                    name: component.name.clone(),
                });
            }
        }

        let mut sites = IndexSet::new();
        for site in &self.sites {
            if !sites.insert(site.identifier.as_str()) {
                return Err(ConfigError::DuplicateSite {
                    identifier: site.identifier.clone(),
                });
            }

            let mut listed = IndexSet::new();
            for entry in &site.components {
                if !listed.insert(entry.name.as_str()) {
                    return Err(ConfigError::DuplicateSiteComponent {
                        site: site.identifier.clone(),
                        component: entry.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Resolve a site's component entry against the global registry.
    ///
    /// # Errors
    ///
    /// Returns error if the component is not registered or one of its
    /// variables holds a malformed reference
    pub fn resolve_site_component(
        &self,
        site: &SiteConfig,
        entry: &SiteComponentConfig,
    ) -> ConfigResult<ResolvedSiteComponent> {
        let definition = self
            .component(&entry.name)
            .ok_or_else(|| ConfigError::MissingComponent {
                component: entry.name.clone(),
                site: site.identifier.clone(),
            })?;

        let deployment = DeploymentType::resolve(self.deployment, site.deployment, entry.deployment);
        let variables = merge_variables_maps([&self.variables, &entry.variables]);

        // Surface malformed references before any graph exists.
        variables.list_referenced_components()?;
        entry.secrets.list_referenced_components()?;

        debug!(
            site = %site.identifier,
            component = %entry.name,
            deployment = %deployment,
            "resolved site component"
        );

        Ok(ResolvedSiteComponent {
            site: site.identifier.clone(),
            name: entry.name.clone(),
            deployment,
            definition: definition.clone(),
            variables,
            secrets: entry.secrets.clone(),
        })
    }
}

/// A site component with its definition and effective settings applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSiteComponent {
    /// Owning site identifier
    pub site: String,
    /// Component name
    pub name: String,
    /// Effective granularity
    pub deployment: DeploymentType,
    /// Global definition
    pub definition: ComponentConfig,
    /// Project variables merged with the component's own
    pub variables: VariablesMap,
    /// Component secrets
    pub secrets: VariablesMap,
}

impl ResolvedSiteComponent {
    /// Distinct components referenced from variables and secrets
    ///
    /// # Errors
    ///
    /// Returns error naming the first malformed reference
    pub fn referenced_components(&self) -> ConfigResult<Vec<String>> {
        let mut seen: IndexSet<String> = self.variables.list_referenced_components()?.into_iter().collect();
        seen.extend(self.secrets.list_referenced_components()?);
        Ok(seen.into_iter().collect())
    }
}
