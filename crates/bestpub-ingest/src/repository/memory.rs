//! In-memory content repository
//!
//! Nodes live in a single ordered map keyed by path, guarded by a tokio mutex,
//! which makes every operation atomic. Used by the test suite.

use async_trait::async_trait;
use mime::Mime;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{
    ChildNode, ContentRepository, NodeRef, NodeType, Properties, RepositoryError,
    RepositoryResult, PROP_NAME,
};

#[derive(Debug, Clone)]
struct NodeRecord {
    node_type: NodeType,
    properties: Properties,
    content_type: Option<Mime>,
    data: Vec<u8>,
}

impl NodeRecord {
    fn folder(node_type: NodeType, properties: Properties) -> Self {
        Self {
            node_type,
            properties,
            content_type: None,
            data: Vec::new(),
        }
    }
}

/// Map-backed [`ContentRepository`]
#[derive(Debug)]
pub struct InMemoryRepository {
    nodes: Mutex<BTreeMap<NodeRef, NodeRecord>>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    /// Create an empty repository containing only the root folder
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            NodeRef::root(),
            NodeRecord::folder(NodeType::Folder, Properties::new()),
        );
        Self {
            nodes: Mutex::new(nodes),
        }
    }

    /// Number of nodes, the root included
    pub async fn node_count(&self) -> usize {
        self.nodes.lock().await.len()
    }
}

fn require_folder(nodes: &BTreeMap<NodeRef, NodeRecord>, node: &NodeRef) -> RepositoryResult<()> {
    match nodes.get(node) {
        Some(record) if record.node_type.is_folder() => Ok(()),
        Some(_) => Err(RepositoryError::NotAFolder(node.to_string())),
        None => Err(RepositoryError::NotFound(node.to_string())),
    }
}

#[async_trait]
impl ContentRepository for InMemoryRepository {
    async fn resolve_path(&self, path: &str) -> RepositoryResult<NodeRef> {
        let node = NodeRef::from_path(path)?;
        if self.nodes.lock().await.contains_key(&node) {
            Ok(node)
        } else {
            Err(RepositoryError::NotFound(node.to_string()))
        }
    }

    async fn get_child(&self, parent: &NodeRef, name: &str) -> RepositoryResult<Option<NodeRef>> {
        let child = parent.child(name)?;
        let nodes = self.nodes.lock().await;
        require_folder(&nodes, parent)?;
        Ok(nodes.contains_key(&child).then_some(child))
    }

    async fn create_child(
        &self,
        parent: &NodeRef,
        name: &str,
        node_type: NodeType,
        mut properties: Properties,
    ) -> RepositoryResult<NodeRef> {
        let child = parent.child(name)?;
        let mut nodes = self.nodes.lock().await;
        require_folder(&nodes, parent)?;
        if nodes.contains_key(&child) {
            return Err(RepositoryError::AlreadyExists(child.to_string()));
        }

        properties.insert(PROP_NAME.to_string(), name.to_string());
        nodes.insert(child.clone(), NodeRecord::folder(node_type, properties));
        Ok(child)
    }

    async fn get_property(&self, node: &NodeRef, key: &str) -> RepositoryResult<Option<String>> {
        let nodes = self.nodes.lock().await;
        let record = nodes
            .get(node)
            .ok_or_else(|| RepositoryError::NotFound(node.to_string()))?;
        Ok(record.properties.get(key).cloned())
    }

    async fn set_property(&self, node: &NodeRef, key: &str, value: &str) -> RepositoryResult<()> {
        let mut nodes = self.nodes.lock().await;
        let record = nodes
            .get_mut(node)
            .ok_or_else(|| RepositoryError::NotFound(node.to_string()))?;
        record.properties.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn write_content(
        &self,
        parent: &NodeRef,
        filename: &str,
        content_type: &Mime,
        data: Vec<u8>,
    ) -> RepositoryResult<NodeRef> {
        let child = parent.child(filename)?;
        let mut nodes = self.nodes.lock().await;
        require_folder(&nodes, parent)?;
        if nodes.contains_key(&child) {
            return Err(RepositoryError::AlreadyExists(child.to_string()));
        }

        let mut properties = Properties::new();
        properties.insert(PROP_NAME.to_string(), filename.to_string());
        nodes.insert(
            child.clone(),
            NodeRecord {
                node_type: NodeType::Content,
                properties,
                content_type: Some(content_type.clone()),
                data,
            },
        );
        Ok(child)
    }

    async fn get_or_create_folder(&self, parent: &NodeRef, name: &str) -> RepositoryResult<NodeRef> {
        let child = parent.child(name)?;
        let mut nodes = self.nodes.lock().await;
        require_folder(&nodes, parent)?;

        match nodes.get(&child) {
            Some(record) if record.node_type.is_folder() => Ok(child),
            Some(_) => Err(RepositoryError::NotAFolder(child.to_string())),
            None => {
                let mut properties = Properties::new();
                properties.insert(PROP_NAME.to_string(), name.to_string());
                nodes.insert(child.clone(), NodeRecord::folder(NodeType::Folder, properties));
                Ok(child)
            },
        }
    }

    async fn list_children(&self, parent: &NodeRef) -> RepositoryResult<Vec<ChildNode>> {
        let nodes = self.nodes.lock().await;
        require_folder(&nodes, parent)?;

        Ok(nodes
            .iter()
            .filter(|(node, _)| node.parent().as_ref() == Some(parent))
            .map(|(node, record)| ChildNode {
                node: node.clone(),
                node_type: record.node_type,
                content_type: record.content_type.clone(),
            })
            .collect())
    }

    async fn read_content(&self, node: &NodeRef) -> RepositoryResult<Vec<u8>> {
        let nodes = self.nodes.lock().await;
        match nodes.get(node) {
            Some(record) if record.node_type == NodeType::Content => Ok(record.data.clone()),
            Some(_) => Err(RepositoryError::NotFound(format!("{} has no content", node))),
            None => Err(RepositoryError::NotFound(node.to_string())),
        }
    }

    async fn delete_node(&self, node: &NodeRef) -> RepositoryResult<()> {
        if node.is_root() {
            return Err(RepositoryError::InvalidName(node.to_string()));
        }

        let mut nodes = self.nodes.lock().await;
        if nodes.remove(node).is_none() {
            return Err(RepositoryError::NotFound(node.to_string()));
        }

        let prefix = format!("{}/", node);
        nodes.retain(|path, _| !path.as_str().starts_with(&prefix));
        Ok(())
    }
}
