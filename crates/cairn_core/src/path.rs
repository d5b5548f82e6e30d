//! Node paths.
//!
//! A path is the slash-joined list of ancestor identifiers ending with the
//! node's own identifier (`main/site-1/component-b`). Paths are the unique
//! keys of the deployment graph.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Separator between path segments
pub const PATH_SEPARATOR: char = '/';

/// Slash-joined path of a graph node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(String);

impl NodePath {
    /// Create a root path from a single identifier
    ///
    /// # Errors
    ///
    /// Returns error if the identifier is empty or contains the separator
    pub fn root(identifier: &str) -> CoreResult<Self> {
        validate_identifier(identifier)?;
        Ok(Self(identifier.to_string()))
    }

    /// Create the path of a child node
    ///
    /// # Errors
    ///
    /// Returns error if the identifier is empty or contains the separator
    pub fn child(&self, identifier: &str) -> CoreResult<Self> {
        validate_identifier(identifier)?;
        Ok(Self(format!("{}{}{}", self.0, PATH_SEPARATOR, identifier)))
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(PATH_SEPARATOR)
    }

    /// Number of segments (root = 1)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Last segment
    #[must_use]
    pub fn identifier(&self) -> &str {
        self.0
            .rsplit_once(PATH_SEPARATOR)
            .map_or(self.0.as_str(), |(_, last)| last)
    }

    /// Path of the parent, `None` for a root
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once(PATH_SEPARATOR)
            .map(|(head, _)| Self(head.to_string()))
    }

    /// The path relative to its root segment.
    ///
    /// This is the key a deployable unit's backend is registered under:
    /// `main/site-1` becomes `site-1`. A root path is its own state key.
    #[must_use]
    pub fn state_key(&self) -> &str {
        self.0
            .split_once(PATH_SEPARATOR)
            .map_or(self.0.as_str(), |(_, rest)| rest)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NodePath {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodePath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

fn validate_identifier(identifier: &str) -> CoreResult<()> {
    if identifier.is_empty() {
        return Err(CoreError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: "identifier is empty".to_string(),
        });
    }
    if identifier.contains(PATH_SEPARATOR) {
        return Err(CoreError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: format!("identifier contains '{}'", PATH_SEPARATOR),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_child() {
        let root = NodePath::root("main").unwrap();
        let site = root.child("site-1").unwrap();
        let component = site.child("component-b").unwrap();

        assert_eq!(component.as_str(), "main/site-1/component-b");
        assert_eq!(component.identifier(), "component-b");
        assert_eq!(component.depth(), 3);
        assert_eq!(component.parent(), Some(site));
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn test_path_state_key() {
        let root = NodePath::root("main").unwrap();
        assert_eq!(root.state_key(), "main");
        assert_eq!(root.child("site-1").unwrap().state_key(), "site-1");
        assert_eq!(
            root.child("site-1").unwrap().child("api").unwrap().state_key(),
            "site-1/api"
        );
    }

    #[test]
    fn test_path_rejects_separator() {
        let root = NodePath::root("main").unwrap();
        assert!(root.child("a/b").is_err());
        assert!(root.child("").is_err());
        assert!(NodePath::root("").is_err());
    }

    #[test]
    fn test_path_borrow_lookup() {
        let mut map = std::collections::HashMap::new();
        map.insert(NodePath::root("main").unwrap(), 1);
        assert_eq!(map.get("main"), Some(&1));
    }
}
