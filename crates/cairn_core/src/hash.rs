//! Content hashes for change detection.
//!
//! Uses BLAKE3 for all hashing operations. Structured values are hashed
//! through their canonical JSON encoding, so two values that serialize to the
//! same bytes always hash identically.

use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A BLAKE3 hash (256 bits / 32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    /// The number of bytes in a hash
    pub const LEN: usize = 32;

    /// Compute BLAKE3 hash of data
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash the canonical JSON encoding of a value
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized
    pub fn of_json<T: Serialize + ?Sized>(value: &T) -> CoreResult<Self> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::compute(&bytes))
    }

    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get as bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    ///
    /// # Errors
    ///
    /// Returns error if hex is invalid or not 32 bytes
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        let bytes = hex::decode(hex).map_err(|_| HashError::InvalidHex)?;
        if bytes.len() != Self::LEN {
            return Err(HashError::InvalidLength(bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Hash-related errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    /// Invalid hex encoding
    #[error("Invalid hex encoding")]
    InvalidHex,
    /// Invalid length (not 32 bytes)
    #[error("Invalid hash length: {0} (expected 32)")]
    InvalidLength(usize),
}

/// Incremental hasher over named fields.
///
/// Every field is written as a length-prefixed name followed by the
/// length-prefixed JSON encoding of its value, so adjacent fields can never
/// run together into the same byte stream.
pub struct ContentHasher {
    inner: blake3::Hasher,
}

impl ContentHasher {
    /// Create a hasher for the given domain (e.g. the node type)
    #[must_use]
    pub fn new(domain: &str) -> Self {
        let mut inner = blake3::Hasher::new();
        write_chunk(&mut inner, domain.as_bytes());
        Self { inner }
    }

    /// Add a named field
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized
    pub fn field<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> CoreResult<&mut Self> {
        let bytes = serde_json::to_vec(value)?;
        write_chunk(&mut self.inner, name.as_bytes());
        write_chunk(&mut self.inner, &bytes);
        Ok(self)
    }

    /// Finish and return the hash
    #[must_use]
    pub fn finish(&self) -> Hash {
        Hash(*self.inner.finalize().as_bytes())
    }
}

fn write_chunk(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
