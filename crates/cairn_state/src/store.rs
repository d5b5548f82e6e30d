//! Stores for previously deployed configuration hashes.
//!
//! The core never owns persistence: the change detector talks to a
//! [`HashStore`] and the runner decides where hashes live. Two stores ship
//! with the crate, an in-memory map for tests and planning dry runs and a
//! JSON file keyed by node path.

use crate::error::{StateError, StateResult};
use async_trait::async_trait;
use cairn_core::Hash;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Async key → hash store
#[async_trait]
pub trait HashStore: Send + Sync {
    /// Fetch the hash recorded for `key`, if any
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    async fn fetch(&self, key: &str) -> StateResult<Option<Hash>>;

    /// Record `hash` for `key`, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be written
    async fn store(&self, key: &str, hash: Hash) -> StateResult<()>;
}

/// In-memory hash store
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    hashes: RwLock<IndexMap<String, Hash>>,
}

impl MemoryHashStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded hashes
    pub async fn len(&self) -> usize {
        self.hashes.read().await.len()
    }

    /// Whether nothing is recorded
    pub async fn is_empty(&self) -> bool {
        self.hashes.read().await.is_empty()
    }
}

#[async_trait]
impl HashStore for MemoryHashStore {
    async fn fetch(&self, key: &str) -> StateResult<Option<Hash>> {
        Ok(self.hashes.read().await.get(key).copied())
    }

    async fn store(&self, key: &str, hash: Hash) -> StateResult<()> {
        self.hashes.write().await.insert(key.to_string(), hash);
        Ok(())
    }
}

/// Hash store backed by a JSON file of `path → hex hash`
#[derive(Debug)]
pub struct FsHashStore {
    path: PathBuf,
    hashes: RwLock<IndexMap<String, Hash>>,
}

impl FsHashStore {
    /// Open the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or decoded
    pub async fn open(path: impl AsRef<Path>) -> StateResult<Self> {
        let path = path.as_ref().to_path_buf();
        let hashes = match tokio::fs::read(&path).await {
            Ok(bytes) => decode(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "hash store not found, starting empty");
                IndexMap::new()
            }
            Err(e) => return Err(io_error(&path, &e)),
        };

        debug!(path = %path.display(), entries = hashes.len(), "opened hash store");
        Ok(Self {
            path,
            hashes: RwLock::new(hashes),
        })
    }

    /// Location of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, hashes: &IndexMap<String, Hash>) -> StateResult<()> {
        let encoded: IndexMap<&str, String> = hashes
            .iter()
            .map(|(key, hash)| (key.as_str(), hash.to_hex()))
            .collect();
        let bytes = serde_json::to_vec_pretty(&encoded).map_err(|e| StateError::Corrupt {
            reason: e.to_string(),
        })?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| io_error(&tmp, &e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, &e))
    }
}

#[async_trait]
impl HashStore for FsHashStore {
    async fn fetch(&self, key: &str) -> StateResult<Option<Hash>> {
        Ok(self.hashes.read().await.get(key).copied())
    }

    async fn store(&self, key: &str, hash: Hash) -> StateResult<()> {
        let mut hashes = self.hashes.write().await;
        hashes.insert(key.to_string(), hash);
        self.flush(&hashes).await
    }
}

fn decode(bytes: &[u8]) -> StateResult<IndexMap<String, Hash>> {
    let raw: IndexMap<String, String> = serde_json::from_slice(bytes).map_err(|e| StateError::Corrupt {
        reason: e.to_string(),
    })?;

    raw.into_iter()
        .map(|(key, hex)| {
            let hash = Hash::from_hex(&hex).map_err(|e| StateError::Corrupt {
                reason: format!("{}: {}", key, e),
            })?;
            Ok((key, hash))
        })
        .collect()
}

fn io_error(path: &Path, err: &std::io::Error) -> StateError {
    StateError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
