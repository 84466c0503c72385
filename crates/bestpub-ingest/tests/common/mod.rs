//! Shared helpers for the ingestion integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use bestpub_common::IngestionStatus;
use bestpub_ingest::config::IngestConfig;
use bestpub_ingest::ingest::{IngestOrchestrator, Taxonomy};
use bestpub_ingest::repository::{
    ChildNode, ContentRepository, InMemoryRepository, NodeRef, NodeType, Properties,
    RepositoryResult, PROP_INGESTION_STATUS,
};
use mime::Mime;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub const CONTENT_FOLDER: &str = "/Company Home/Data Dictionary/BestPub/Incoming/Content";

/// Write a ZIP archive; entry names ending in `/` become directory entries
pub fn write_archive(dir: &Path, name: &str, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (entry, data) in entries {
        if entry.ends_with('/') {
            zip.add_directory(*entry, SimpleFileOptions::default()).unwrap();
        } else {
            zip.start_file(*entry, SimpleFileOptions::default()).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
    }
    zip.finish().unwrap();
    path
}

/// Temp source/quarantine directories plus a configuration pointing at them
pub struct Harness {
    pub dir: TempDir,
    pub config: IngestConfig,
}

impl Harness {
    pub fn new(taxonomy: Taxonomy) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = IngestConfig::default();
        config.source_dir = dir.path().join("incoming");
        config.quarantine_dir = dir.path().join("failed");
        config.repository_root = dir.path().join("repository");
        config.schedule.lock_dir = dir.path().join("locks");
        config.pipeline.taxonomy = taxonomy;
        std::fs::create_dir_all(&config.source_dir).unwrap();
        Self { dir, config }
    }

    pub fn source_dir(&self) -> &Path {
        &self.config.source_dir
    }

    pub fn quarantine_dir(&self) -> &Path {
        &self.config.quarantine_dir
    }

    pub fn add_archive(&self, name: &str, entries: &[(&str, &str)]) -> PathBuf {
        write_archive(self.source_dir(), name, entries)
    }

    pub fn add_file(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.source_dir().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    pub fn orchestrator(&self, repository: Arc<dyn ContentRepository>) -> IngestOrchestrator {
        IngestOrchestrator::from_config(&self.config, repository)
    }

    pub fn quarantined(&self) -> Vec<String> {
        list_names(self.quarantine_dir())
    }

    pub fn remaining(&self) -> Vec<String> {
        list_names(self.source_dir())
    }
}

fn list_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn content_path(child: &str) -> String {
    format!("{}/{}", CONTENT_FOLDER, child)
}

pub async fn status_of(repository: &dyn ContentRepository, path: &str) -> Option<IngestionStatus> {
    let node = repository.resolve_path(path).await.ok()?;
    repository
        .get_property(&node, PROP_INGESTION_STATUS)
        .await
        .unwrap()
        .and_then(|s| s.parse().ok())
}

/// Names of the direct children of `path`
pub async fn child_names(repository: &dyn ContentRepository, path: &str) -> Vec<String> {
    let node = repository.resolve_path(path).await.unwrap();
    repository
        .list_children(&node)
        .await
        .unwrap()
        .iter()
        .map(|c| c.name().to_string())
        .collect()
}

/// Every path below `path`, relative to it, sorted
pub async fn tree(repository: &dyn ContentRepository, path: &str) -> Vec<String> {
    let root = repository.resolve_path(path).await.unwrap();
    let prefix = format!("{}/", root);
    let mut pending = vec![root];
    let mut paths = Vec::new();

    while let Some(node) = pending.pop() {
        for child in repository.list_children(&node).await.unwrap() {
            paths.push(child.node.as_str().trim_start_matches(&prefix).to_string());
            if child.node_type.is_folder() {
                pending.push(child.node);
            }
        }
    }

    paths.sort();
    paths
}

/// In-memory repository that counts every call
#[derive(Debug, Default)]
pub struct CountingRepository {
    inner: InMemoryRepository,
    calls: AtomicUsize,
}

impl CountingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentRepository for CountingRepository {
    async fn resolve_path(&self, path: &str) -> RepositoryResult<NodeRef> {
        self.count();
        self.inner.resolve_path(path).await
    }

    async fn get_child(&self, parent: &NodeRef, name: &str) -> RepositoryResult<Option<NodeRef>> {
        self.count();
        self.inner.get_child(parent, name).await
    }

    async fn create_child(
        &self,
        parent: &NodeRef,
        name: &str,
        node_type: NodeType,
        properties: Properties,
    ) -> RepositoryResult<NodeRef> {
        self.count();
        self.inner.create_child(parent, name, node_type, properties).await
    }

    async fn get_property(&self, node: &NodeRef, key: &str) -> RepositoryResult<Option<String>> {
        self.count();
        self.inner.get_property(node, key).await
    }

    async fn set_property(&self, node: &NodeRef, key: &str, value: &str) -> RepositoryResult<()> {
        self.count();
        self.inner.set_property(node, key, value).await
    }

    async fn write_content(
        &self,
        parent: &NodeRef,
        filename: &str,
        content_type: &Mime,
        data: Vec<u8>,
    ) -> RepositoryResult<NodeRef> {
        self.count();
        self.inner.write_content(parent, filename, content_type, data).await
    }

    async fn get_or_create_folder(&self, parent: &NodeRef, name: &str) -> RepositoryResult<NodeRef> {
        self.count();
        self.inner.get_or_create_folder(parent, name).await
    }

    async fn list_children(&self, parent: &NodeRef) -> RepositoryResult<Vec<ChildNode>> {
        self.count();
        self.inner.list_children(parent).await
    }

    async fn read_content(&self, node: &NodeRef) -> RepositoryResult<Vec<u8>> {
        self.count();
        self.inner.read_content(node).await
    }

    async fn delete_node(&self, node: &NodeRef) -> RepositoryResult<()> {
        self.count();
        self.inner.delete_node(node).await
    }
}
