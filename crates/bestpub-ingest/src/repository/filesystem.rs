//! Directory-tree content repository
//!
//! Repository paths map onto directories below `root_dir`. Folder nodes
//! created through [`ContentRepository::create_child`] carry a `.node.json`
//! sidecar holding their type and properties; directories without one are
//! plain folders. Content items are regular files and their content type is
//! derived from the extension on read.

use async_trait::async_trait;
use bestpub_common::content_type::content_type_for;
use mime::Mime;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{
    ChildNode, ContentRepository, NodeRef, NodeType, Properties, RepositoryError,
    RepositoryResult, PROP_NAME,
};

const SIDECAR: &str = ".node.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeMeta {
    node_type: NodeType,
    #[serde(default)]
    properties: Properties,
}

/// Remove a folder whose sidecar could not be written
async fn discard_partial_dir(path: &Path) -> bool {
    match fs::remove_dir_all(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not remove partially created folder");
            false
        },
    }
}

/// [`ContentRepository`] stored as a directory tree
#[derive(Debug, Clone)]
pub struct FsRepository {
    root_dir: PathBuf,
}

impl FsRepository {
    /// Open (and create if missing) a repository rooted at `root_dir`
    pub async fn open(root_dir: impl Into<PathBuf>) -> RepositoryResult<Self> {
        let root_dir = root_dir.into();
        fs::create_dir_all(&root_dir).await?;
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn local_path(&self, node: &NodeRef) -> PathBuf {
        node.segments()
            .fold(self.root_dir.clone(), |path, segment| path.join(segment))
    }

    fn sidecar_path(&self, node: &NodeRef) -> PathBuf {
        self.local_path(node).join(SIDECAR)
    }

    async fn read_meta(&self, node: &NodeRef) -> RepositoryResult<Option<NodeMeta>> {
        match fs::read(self.sidecar_path(node)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_meta(&self, node: &NodeRef, meta: &NodeMeta) -> RepositoryResult<()> {
        let bytes = serde_json::to_vec_pretty(meta)?;
        fs::write(self.sidecar_path(node), bytes).await?;
        Ok(())
    }

    async fn node_type(&self, node: &NodeRef) -> RepositoryResult<NodeType> {
        let path = self.local_path(node);
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RepositoryError::NotFound(node.to_string()))
            },
            Err(e) => return Err(e.into()),
        };

        if !metadata.is_dir() {
            return Ok(NodeType::Content);
        }
        Ok(self
            .read_meta(node)
            .await?
            .map(|meta| meta.node_type)
            .unwrap_or(NodeType::Folder))
    }

    async fn require_folder(&self, node: &NodeRef) -> RepositoryResult<()> {
        if self.node_type(node).await?.is_folder() {
            Ok(())
        } else {
            Err(RepositoryError::NotAFolder(node.to_string()))
        }
    }
}

fn validate_fs_name(name: &str) -> RepositoryResult<()> {
    if name == SIDECAR {
        return Err(RepositoryError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ContentRepository for FsRepository {
    async fn resolve_path(&self, path: &str) -> RepositoryResult<NodeRef> {
        let node = NodeRef::from_path(path)?;
        self.node_type(&node).await?;
        Ok(node)
    }

    async fn get_child(&self, parent: &NodeRef, name: &str) -> RepositoryResult<Option<NodeRef>> {
        validate_fs_name(name)?;
        let child = parent.child(name)?;
        self.require_folder(parent).await?;
        Ok(fs::try_exists(self.local_path(&child))
            .await?
            .then_some(child))
    }

    async fn create_child(
        &self,
        parent: &NodeRef,
        name: &str,
        node_type: NodeType,
        mut properties: Properties,
    ) -> RepositoryResult<NodeRef> {
        validate_fs_name(name)?;
        let child = parent.child(name)?;
        self.require_folder(parent).await?;

        // Non-recursive create_dir fails if the name is taken, which is the
        // collision check.
        let path = self.local_path(&child);
        match fs::create_dir(&path).await {
            Ok(()) => {},
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RepositoryError::AlreadyExists(child.to_string()))
            },
            Err(e) => return Err(e.into()),
        }

        properties.insert(PROP_NAME.to_string(), name.to_string());
        let meta = NodeMeta {
            node_type,
            properties,
        };
        if let Err(e) = self.write_meta(&child, &meta).await {
            discard_partial_dir(&path).await;
            return Err(e);
        }

        debug!(node = %child, ?node_type, "Created node");
        Ok(child)
    }

    async fn get_property(&self, node: &NodeRef, key: &str) -> RepositoryResult<Option<String>> {
        match self.node_type(node).await? {
            NodeType::Content => Ok((key == PROP_NAME).then(|| node.name().to_string())),
            _ => {
                let meta = self.read_meta(node).await?;
                match meta {
                    Some(meta) => Ok(meta.properties.get(key).cloned()),
                    None if key == PROP_NAME && !node.is_root() => Ok(Some(node.name().to_string())),
                    None => Ok(None),
                }
            },
        }
    }

    async fn set_property(&self, node: &NodeRef, key: &str, value: &str) -> RepositoryResult<()> {
        let node_type = self.node_type(node).await?;
        if !node_type.is_folder() {
            return Err(RepositoryError::NotAFolder(node.to_string()));
        }

        let mut meta = self.read_meta(node).await?.unwrap_or_else(|| NodeMeta {
            node_type,
            properties: Properties::new(),
        });
        meta.properties.insert(key.to_string(), value.to_string());
        self.write_meta(node, &meta).await
    }

    async fn write_content(
        &self,
        parent: &NodeRef,
        filename: &str,
        _content_type: &Mime,
        data: Vec<u8>,
    ) -> RepositoryResult<NodeRef> {
        validate_fs_name(filename)?;
        let child = parent.child(filename)?;
        self.require_folder(parent).await?;

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.local_path(&child))
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RepositoryError::AlreadyExists(child.to_string()))
            },
            Err(e) => return Err(e.into()),
        };
        file.write_all(&data).await?;
        file.flush().await?;

        Ok(child)
    }

    async fn get_or_create_folder(&self, parent: &NodeRef, name: &str) -> RepositoryResult<NodeRef> {
        validate_fs_name(name)?;
        let child = parent.child(name)?;
        self.require_folder(parent).await?;

        match fs::create_dir(self.local_path(&child)).await {
            Ok(()) => Ok(child),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                self.require_folder(&child).await?;
                Ok(child)
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn list_children(&self, parent: &NodeRef) -> RepositoryResult<Vec<ChildNode>> {
        self.require_folder(parent).await?;

        let mut entries = fs::read_dir(self.local_path(parent)).await?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == SIDECAR {
                continue;
            }
            let node = parent.child(&name)?;
            let node_type = self.node_type(&node).await?;
            let content_type = (node_type == NodeType::Content).then(|| content_type_for(&name));
            children.push(ChildNode {
                node,
                node_type,
                content_type,
            });
        }

        children.sort_by(|a, b| a.node.cmp(&b.node));
        Ok(children)
    }

    async fn read_content(&self, node: &NodeRef) -> RepositoryResult<Vec<u8>> {
        if self.node_type(node).await? != NodeType::Content {
            return Err(RepositoryError::NotFound(format!("{} has no content", node)));
        }
        Ok(fs::read(self.local_path(node)).await?)
    }

    async fn delete_node(&self, node: &NodeRef) -> RepositoryResult<()> {
        if node.is_root() {
            return Err(RepositoryError::InvalidName(node.to_string()));
        }

        let path = self.local_path(node);
        match self.node_type(node).await? {
            NodeType::Content => fs::remove_file(&path).await?,
            _ => fs::remove_dir_all(&path).await?,
        }
        debug!(node = %node, "Deleted node");
        Ok(())
    }
}
