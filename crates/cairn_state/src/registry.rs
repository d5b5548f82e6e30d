//! Registry of state backends, keyed by the state key of each deployable
//! unit.

use crate::error::{StateError, StateResult};
use cairn_plan::Graph;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Renders the Terraform configuration for one unit's state
pub trait Backend: Send + Sync + fmt::Debug {
    /// State key this backend belongs to
    fn key(&self) -> &str;

    /// The `backend` block for the unit's own configuration
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be rendered
    fn backend(&self) -> StateResult<String>;

    /// A `terraform_remote_state` data source other units use to read this
    /// unit's outputs
    ///
    /// # Errors
    ///
    /// Returns error if the data source cannot be rendered
    fn remote_state(&self) -> StateResult<String>;
}

/// Terraform identifier for a state key
#[must_use]
pub fn data_source_name(key: &str) -> String {
    key.replace(['/', '-'], "_")
}

/// State kept on local disk, one directory per unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBackend {
    key: String,
    root: String,
}

impl LocalBackend {
    /// Create a backend storing state under `root/<key>`
    #[must_use]
    pub fn new(key: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            root: root.into(),
        }
    }

    fn state_path(&self) -> String {
        format!("{}/{}/terraform.tfstate", self.root.trim_end_matches('/'), self.key)
    }
}

impl Backend for LocalBackend {
    fn key(&self) -> &str {
        &self.key
    }

    fn backend(&self) -> StateResult<String> {
        Ok(format!(
            "backend \"local\" {{\n  path = \"{}\"\n}}\n",
            self.state_path()
        ))
    }

    fn remote_state(&self) -> StateResult<String> {
        Ok(format!(
            "data \"terraform_remote_state\" \"{}\" {{\n  backend = \"local\"\n\n  config = {{\n    path = \"{}\"\n  }}\n}}\n",
            data_source_name(&self.key),
            self.state_path()
        ))
    }
}

/// State kept in a Terraform Cloud organization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBackend {
    key: String,
    organization: String,
    hostname: Option<String>,
    workspace_prefix: Option<String>,
}

impl RemoteBackend {
    /// Create a backend for `organization`
    #[must_use]
    pub fn new(key: impl Into<String>, organization: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            organization: organization.into(),
            hostname: None,
            workspace_prefix: None,
        }
    }

    /// Set the Terraform Cloud hostname
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Prefix workspace names
    #[must_use]
    pub fn with_workspace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.workspace_prefix = Some(prefix.into());
        self
    }

    fn settings(&self, indent: &str) -> StateResult<String> {
        if self.organization.is_empty() {
            return Err(StateError::Backend {
                key: self.key.clone(),
                reason: "organization is empty".to_string(),
            });
        }

        let mut out = format!("{indent}organization = \"{}\"\n", self.organization);
        if let Some(hostname) = &self.hostname {
            out.push_str(&format!("{indent}hostname = \"{}\"\n", hostname));
        }
        let workspace = format!(
            "{}{}",
            self.workspace_prefix.as_deref().unwrap_or_default(),
            data_source_name(&self.key)
        );
        out.push_str(&format!("{indent}workspaces {{\n{indent}  name = \"{}\"\n{indent}}}\n", workspace));
        Ok(out)
    }
}

impl Backend for RemoteBackend {
    fn key(&self) -> &str {
        &self.key
    }

    fn backend(&self) -> StateResult<String> {
        Ok(format!("backend \"remote\" {{\n{}}}\n", self.settings("  ")?))
    }

    fn remote_state(&self) -> StateResult<String> {
        Ok(format!(
            "data \"terraform_remote_state\" \"{}\" {{\n  backend = \"remote\"\n\n  config = {{\n{}  }}\n}}\n",
            data_source_name(&self.key),
            self.settings("    ")?
        ))
    }
}

/// Backends by state key
#[derive(Debug, Clone, Default)]
pub struct StateRegistry {
    backends: IndexMap<String, Arc<dyn Backend>>,
}

impl StateRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local backend for every vertex of `graph`
    #[must_use]
    pub fn local_for(graph: &Graph, root: &str) -> Self {
        let mut registry = Self::new();
        for node in graph.vertices() {
            let key = node.state_key().to_string();
            registry
                .backends
                .insert(key.clone(), Arc::new(LocalBackend::new(key, root)));
        }
        debug!(backends = registry.len(), "registered local backends");
        registry
    }

    /// Register a backend under its own key
    ///
    /// # Errors
    ///
    /// Returns error if a backend is already registered for the key
    pub fn register(&mut self, backend: Arc<dyn Backend>) -> StateResult<()> {
        let key = backend.key().to_string();
        if self.backends.contains_key(&key) {
            return Err(StateError::AlreadyRegistered { key });
        }
        self.backends.insert(key, backend);
        Ok(())
    }

    /// Whether a backend is registered for `key`
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.backends.contains_key(key)
    }

    /// Backend registered for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<dyn Backend>> {
        self.backends.get(key).cloned()
    }

    /// Registered keys in registration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    /// Number of backends
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
