//! Content repository contract
//!
//! The ingestion pipeline never talks to storage directly. It consumes the
//! narrow [`ContentRepository`] trait: resolve a path, look up a child, create
//! nodes with properties, write content streams and get-or-create folders.
//!
//! Node references are absolute repository paths
//! (`/Company Home/Data Dictionary/BestPub/Incoming/Content/9780486282146`),
//! so a [`NodeRef`] can be logged and compared without a round trip.
//!
//! Two implementations ship with the crate:
//! - [`InMemoryRepository`]: map-backed, used by tests and dry runs
//! - [`FsRepository`]: directory tree on local or shared disk

use async_trait::async_trait;
use mime::Mime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod filesystem;
pub mod memory;

pub use filesystem::FsRepository;
pub use memory::InMemoryRepository;

/// Property holding the node name
pub const PROP_NAME: &str = "name";

/// Property holding the package ISBN
pub const PROP_ISBN: &str = "isbn";

/// Property holding the package [`bestpub_common::IngestionStatus`]
pub const PROP_INGESTION_STATUS: &str = "ingestionStatus";

/// Node properties, keyed by property name
pub type Properties = BTreeMap<String, String>;

/// Result type alias for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Node already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid node name: {0:?}")]
    InvalidName(String),

    #[error("Not a folder: {0}")]
    NotAFolder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reference to a repository node (its absolute path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef(String);

impl NodeRef {
    /// The repository root
    pub fn root() -> Self {
        NodeRef("/".to_string())
    }

    /// Parse an absolute repository path, normalising duplicate and trailing slashes
    pub fn from_path(path: &str) -> RepositoryResult<Self> {
        if !path.starts_with('/') {
            return Err(RepositoryError::InvalidName(path.to_string()));
        }
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for segment in &segments {
            validate_name(segment)?;
        }
        Ok(NodeRef(format!("/{}", segments.join("/"))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reference to the child called `name`
    pub fn child(&self, name: &str) -> RepositoryResult<NodeRef> {
        validate_name(name)?;
        if self.is_root() {
            Ok(NodeRef(format!("/{}", name)))
        } else {
            Ok(NodeRef(format!("{}/{}", self.0, name)))
        }
    }

    /// Reference to the parent node, `None` for the root
    pub fn parent(&self) -> Option<NodeRef> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(NodeRef::root()),
            Some(idx) => Some(NodeRef(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Last path segment; empty for the root
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path segments below the root
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Type tag of a repository node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Plain folder
    Folder,
    /// Folder holding one ingested book package, carries the ingestion status
    PackageFolder,
    /// Content item (file)
    Content,
}

impl NodeType {
    pub fn is_folder(&self) -> bool {
        matches!(self, NodeType::Folder | NodeType::PackageFolder)
    }
}

/// Summary of a child node, as returned by [`ContentRepository::list_children`]
#[derive(Debug, Clone, PartialEq)]
pub struct ChildNode {
    pub node: NodeRef,
    pub node_type: NodeType,
    /// Content type for content items, `None` for folders
    pub content_type: Option<Mime>,
}

impl ChildNode {
    pub fn name(&self) -> &str {
        self.node.name()
    }
}

/// Storage, naming and property services consumed by the ingestion pipeline.
///
/// Implementations must make [`create_child`](Self::create_child) atomic with
/// respect to name collisions: two concurrent creations of the same name must
/// not both succeed.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Resolve an absolute repository path to an existing node
    async fn resolve_path(&self, path: &str) -> RepositoryResult<NodeRef>;

    /// Look up a direct child by exact name
    async fn get_child(&self, parent: &NodeRef, name: &str) -> RepositoryResult<Option<NodeRef>>;

    /// Create a folder-like child with its initial properties in one step.
    ///
    /// Fails with [`RepositoryError::AlreadyExists`] if the name is taken.
    async fn create_child(
        &self,
        parent: &NodeRef,
        name: &str,
        node_type: NodeType,
        properties: Properties,
    ) -> RepositoryResult<NodeRef>;

    async fn get_property(&self, node: &NodeRef, key: &str) -> RepositoryResult<Option<String>>;

    async fn set_property(&self, node: &NodeRef, key: &str, value: &str) -> RepositoryResult<()>;

    /// Write a new content item named `filename` under `parent`
    async fn write_content(
        &self,
        parent: &NodeRef,
        filename: &str,
        content_type: &Mime,
        data: Vec<u8>,
    ) -> RepositoryResult<NodeRef>;

    /// Return the folder called `name` under `parent`, creating it if needed.
    ///
    /// Calling this twice returns the same reference and creates one folder.
    async fn get_or_create_folder(&self, parent: &NodeRef, name: &str) -> RepositoryResult<NodeRef>;

    /// List the direct children of a folder, ordered by name
    async fn list_children(&self, parent: &NodeRef) -> RepositoryResult<Vec<ChildNode>>;

    /// Read back the bytes of a content item
    async fn read_content(&self, node: &NodeRef) -> RepositoryResult<Vec<u8>>;

    /// Delete a node and everything below it
    async fn delete_node(&self, node: &NodeRef) -> RepositoryResult<()>;
}

/// Resolve `path`, creating every missing folder along the way
pub async fn ensure_folder_path(
    repository: &dyn ContentRepository,
    path: &str,
) -> RepositoryResult<NodeRef> {
    let target = NodeRef::from_path(path)?;
    let mut current = NodeRef::root();
    for segment in target.segments() {
        current = repository.get_or_create_folder(&current, segment).await?;
    }
    Ok(current)
}

/// Reject names that cannot be a single path segment
pub(crate) fn validate_name(name: &str) -> RepositoryResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(RepositoryError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ref_from_path_normalises() {
        let node = NodeRef::from_path("/Company Home//Data Dictionary/").unwrap();
        assert_eq!(node.as_str(), "/Company Home/Data Dictionary");
        assert_eq!(node.name(), "Data Dictionary");
        assert_eq!(node.parent().unwrap().as_str(), "/Company Home");
        assert_eq!(node.parent().unwrap().parent().unwrap(), NodeRef::root());
        assert!(NodeRef::root().parent().is_none());
    }

    #[test]
    fn test_node_ref_rejects_relative_and_dot_segments() {
        assert!(NodeRef::from_path("Company Home").is_err());
        assert!(NodeRef::from_path("/Company Home/../etc").is_err());
    }

    #[test]
    fn test_child_name_validation() {
        let root = NodeRef::root();
        assert_eq!(root.child("Content").unwrap().as_str(), "/Content");
        assert!(root.child("a/b").is_err());
        assert!(root.child("").is_err());
    }
}
