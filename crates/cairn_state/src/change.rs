//! Change detection.
//!
//! A deployable unit needs deploying when it is tainted or when its current
//! configuration hash differs from the one recorded after its last deploy.
//! Lookups go through an async [`HashStore`] and can be cancelled or timed
//! out without blocking the caller.

use crate::error::ChangeError;
use crate::store::HashStore;
use cairn_core::{Hash, NodePath};
use cairn_plan::{Graph, Node};
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Change detector configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Maximum time for a single hash lookup in milliseconds
    pub timeout_ms: u64,
}

impl DetectorConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self { timeout_ms: 30_000 }
    }

    /// Set the lookup timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Compares node hashes with the hashes recorded in a store
#[derive(Clone)]
pub struct ChangeDetector {
    store: Arc<dyn HashStore>,
    config: DetectorConfig,
}

impl ChangeDetector {
    /// Create a detector over `store`
    #[must_use]
    pub fn new(store: Arc<dyn HashStore>, config: DetectorConfig) -> Self {
        Self { store, config }
    }

    /// Configuration in effect
    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Whether the node's configuration differs from the recorded one.
    /// A node with no recorded hash counts as changed.
    ///
    /// # Errors
    ///
    /// Returns [`ChangeError::Cancelled`] or [`ChangeError::Timeout`] if the
    /// lookup does not complete, or the store's own error
    pub async fn has_config_changes(&self, node: &Node, cancel: &CancellationToken) -> Result<bool, ChangeError> {
        let current = node.hash()?;
        let previous = self.fetch(node.path(), cancel).await?;

        let changed = previous != Some(current);
        debug!(
            path = %node.path(),
            changed,
            recorded = previous.is_some(),
            "compared configuration hash"
        );
        Ok(changed)
    }

    /// Whether the node has to be deployed: tainted or changed
    ///
    /// # Errors
    ///
    /// Same as [`has_config_changes`](Self::has_config_changes)
    pub async fn needs_deploy(&self, node: &Node, cancel: &CancellationToken) -> Result<bool, ChangeError> {
        if node.tainted() {
            return Ok(true);
        }
        self.has_config_changes(node, cancel).await
    }

    /// Paths of every vertex that needs deploying, in graph order.
    ///
    /// All lookups run concurrently; the first failure aborts the rest.
    ///
    /// # Errors
    ///
    /// Returns the first lookup error
    pub async fn changed_nodes(&self, graph: &Graph, cancel: &CancellationToken) -> Result<Vec<NodePath>, ChangeError> {
        let checks = graph.vertices().map(|node| async move {
            let deploy = self.needs_deploy(node, cancel).await?;
            Ok::<_, ChangeError>(deploy.then(|| node.path().clone()))
        });

        let changed: Vec<NodePath> = try_join_all(checks).await?.into_iter().flatten().collect();
        info!(
            checked = graph.vertex_count(),
            changed = changed.len(),
            "detected configuration changes"
        );
        Ok(changed)
    }

    /// Record the current hash of every vertex
    ///
    /// # Errors
    ///
    /// Returns error if a node cannot be hashed or the store rejects a write
    pub async fn record(&self, graph: &Graph) -> Result<usize, ChangeError> {
        let paths: Vec<NodePath> = graph.vertices().map(|node| node.path().clone()).collect();
        self.record_paths(graph, &paths).await
    }

    /// Record the current hash of the given vertices only
    ///
    /// Paths that are not vertices of `graph` are skipped; hashes stored for
    /// every other unit are left untouched.
    ///
    /// # Errors
    ///
    /// Returns error if a node cannot be hashed or the store rejects a write
    pub async fn record_paths(&self, graph: &Graph, paths: &[NodePath]) -> Result<usize, ChangeError> {
        let mut recorded = 0;
        for node in paths.iter().filter_map(|path| graph.vertex(path.as_str())) {
            self.store.store(node.path().as_str(), node.hash()?).await?;
            recorded += 1;
        }
        debug!(recorded, "recorded configuration hashes");
        Ok(recorded)
    }

    async fn fetch(&self, path: &NodePath, cancel: &CancellationToken) -> Result<Option<Hash>, ChangeError> {
        let timeout = Duration::from_millis(self.config.timeout_ms);

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ChangeError::Cancelled {
                path: path.to_string(),
            }),
            result = tokio::time::timeout(timeout, self.store.fetch(path.as_str())) => match result {
                Ok(hash) => Ok(hash?),
                Err(_) => Err(ChangeError::Timeout {
                    path: path.to_string(),
                    timeout_ms: self.config.timeout_ms,
                }),
            },
        }
    }
}
