//! Archive extraction
//!
//! Walks a ZIP archive entry by entry, classifies every file entry with the
//! configured [`ContentTaxonomy`] and writes it into the matching sub-folder of
//! the package folder. Any read failure aborts the whole archive with
//! [`IngestError::Extraction`]; entries the taxonomy does not recognise are
//! logged and skipped.

use bestpub_common::content_type::content_type_for;
use bestpub_common::Isbn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::{ExtractionCause, IngestError, IngestResult};
use crate::ingest::classifier::{
    Category, ClassifiedEntry, ContentTaxonomy, Destination, ADOBE_CHAPTERS_FOLDER_NAME,
};
use crate::ingest::splitter::{ChapterDocument, DescriptorSplitter};
use crate::ingest::validation::is_descriptor_filename;
use crate::repository::{ContentRepository, NodeRef};

/// How the containing directory of an entry is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectoryTracking {
    /// From each entry's own path; independent of entry order
    PathDerived,
    /// From the last directory entry seen while iterating. Only correct for
    /// archives that list each directory before its files.
    RunningDirectory,
}

impl FromStr for DirectoryTracking {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "path-derived" | "path_derived" => Ok(DirectoryTracking::PathDerived),
            "running-directory" | "running_directory" => Ok(DirectoryTracking::RunningDirectory),
            _ => Err(format!(
                "Unknown directory tracking {:?}, expected 'path-derived' or 'running-directory'",
                s
            )),
        }
    }
}

/// Summary of one archive extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    pub files_written: usize,
    /// Package sub-folders that received at least one file
    pub folders: BTreeSet<String>,
    pub categories: BTreeMap<Category, usize>,
    /// Entry paths that matched no rule
    pub skipped: Vec<String>,
    /// Chapter XML files cut out of the master content XML
    pub chapters_split: usize,
}

impl ExtractionReport {
    fn record(&mut self, entry: &ClassifiedEntry) {
        self.files_written += 1;
        *self.categories.entry(entry.category).or_default() += 1;
        if let Destination::Folder(name) = entry.destination {
            self.folders.insert(name.to_string());
        }
    }
}

/// An archive entry read fully into memory
struct RawEntry {
    name: String,
    is_dir: bool,
    data: Vec<u8>,
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, index: usize) -> Result<RawEntry, ExtractionCause> {
    let mut file = archive.by_index(index)?;
    let name = file.name().to_string();
    if file.is_dir() {
        return Ok(RawEntry {
            name,
            is_dir: true,
            data: Vec::new(),
        });
    }

    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(RawEntry {
        name,
        is_dir: false,
        data,
    })
}

/// Writes the files of one archive into a package folder
#[derive(Clone)]
pub struct ArchiveExtractor {
    repository: Arc<dyn ContentRepository>,
    taxonomy: Arc<dyn ContentTaxonomy>,
    tracking: DirectoryTracking,
    splitter: Option<DescriptorSplitter>,
    write_error_notes: bool,
}

impl ArchiveExtractor {
    pub fn new(repository: Arc<dyn ContentRepository>, taxonomy: Arc<dyn ContentTaxonomy>) -> Self {
        Self {
            repository,
            taxonomy,
            tracking: DirectoryTracking::PathDerived,
            splitter: None,
            write_error_notes: true,
        }
    }

    pub fn with_tracking(mut self, tracking: DirectoryTracking) -> Self {
        self.tracking = tracking;
        self
    }

    /// Split the master content XML into chapter XML files while extracting
    pub fn with_splitter(mut self, splitter: Option<DescriptorSplitter>) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_error_notes(mut self, enabled: bool) -> Self {
        self.write_error_notes = enabled;
        self
    }

    pub fn taxonomy(&self) -> &Arc<dyn ContentTaxonomy> {
        &self.taxonomy
    }

    /// Extract `archive_path` into `package`.
    ///
    /// On a read failure a timestamped error note is written into the
    /// package folder (if enabled) before the error is returned.
    pub async fn extract(&self, archive_path: &Path, package: &NodeRef, isbn: &Isbn) -> IngestResult<ExtractionReport> {
        let archive_name = archive_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| archive_path.display().to_string());

        let result = self.extract_entries(archive_path, &archive_name, package, isbn).await;
        if let Err(err @ IngestError::Extraction { .. }) = &result {
            if self.write_error_notes {
                self.write_error_note(package, isbn, err).await;
            }
        }
        result
    }

    async fn extract_entries(
        &self,
        archive_path: &Path,
        archive_name: &str,
        package: &NodeRef,
        isbn: &Isbn,
    ) -> IngestResult<ExtractionReport> {
        let bytes = tokio::fs::read(archive_path)
            .await
            .map_err(|e| IngestError::extraction(archive_name, e))?;
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| IngestError::extraction(archive_name, e))?;

        debug!(archive = archive_name, entries = archive.len(), "Opened archive");

        let mut report = ExtractionReport::default();
        let mut folders: HashMap<&'static str, NodeRef> = HashMap::new();
        let mut current_dir: Option<String> = None;
        let mut split_chapters: Vec<ChapterDocument> = Vec::new();

        for index in 0..archive.len() {
            let raw = read_entry(&mut archive, index).map_err(|e| IngestError::extraction(archive_name, e))?;

            if raw.is_dir {
                if self.tracking == DirectoryTracking::RunningDirectory {
                    current_dir = Some(raw.name);
                }
                continue;
            }

            let entry_path = self.classification_path(&raw.name, current_dir.as_deref());
            let classified = self.taxonomy.classify(&entry_path);

            let parent = match classified.destination {
                Destination::Skip => {
                    warn!(
                        archive = archive_name,
                        entry = %raw.name,
                        category = %classified.category,
                        "Found unrecognized entry, will not ingest"
                    );
                    report.skipped.push(raw.name);
                    continue;
                },
                Destination::PackageRoot => package.clone(),
                Destination::Folder(name) => self.folder(package, name, &mut folders).await?,
            };

            if let Some(splitter) = &self.splitter {
                if classified.category == Category::Descriptor && is_descriptor_filename(isbn, &classified.filename) {
                    split_chapters = splitter.split(isbn.as_str(), &classified.filename, &raw.data)?;
                }
            }

            let content_type = content_type_for(&classified.filename);
            self.repository
                .write_content(&parent, &classified.filename, &content_type, raw.data)
                .await?;
            debug!(
                entry = %raw.name,
                category = %classified.category,
                folder = %parent,
                filename = %classified.filename,
                "Stored entry"
            );
            report.record(&classified);
        }

        // Split output goes in last; chapter XML shipped in the archive is kept
        if !split_chapters.is_empty() {
            let chapter_folder = self
                .folder(package, ADOBE_CHAPTERS_FOLDER_NAME, &mut folders)
                .await?;
            for chapter in split_chapters {
                if self
                    .repository
                    .get_child(&chapter_folder, &chapter.filename)
                    .await?
                    .is_some()
                {
                    warn!(filename = %chapter.filename, "Chapter XML already present, keeping the shipped file");
                    continue;
                }
                let content_type = content_type_for(&chapter.filename);
                self.repository
                    .write_content(&chapter_folder, &chapter.filename, &content_type, chapter.data)
                    .await?;
                report.chapters_split += 1;
            }
            report.folders.insert(ADOBE_CHAPTERS_FOLDER_NAME.to_string());
        }

        info!(
            archive = archive_name,
            files = report.files_written,
            skipped = report.skipped.len(),
            chapters_split = report.chapters_split,
            "Extracted archive"
        );
        Ok(report)
    }

    /// Path handed to the classifier for an entry
    fn classification_path(&self, entry_name: &str, current_dir: Option<&str>) -> String {
        match self.tracking {
            DirectoryTracking::PathDerived => entry_name.to_string(),
            DirectoryTracking::RunningDirectory => {
                let filename = entry_name.rsplit('/').next().unwrap_or(entry_name);
                match current_dir {
                    Some(dir) => format!("{}/{}", dir.trim_end_matches('/'), filename),
                    None => filename.to_string(),
                }
            },
        }
    }

    async fn folder(
        &self,
        package: &NodeRef,
        name: &'static str,
        cache: &mut HashMap<&'static str, NodeRef>,
    ) -> IngestResult<NodeRef> {
        if let Some(folder) = cache.get(name) {
            return Ok(folder.clone());
        }
        let folder = self.repository.get_or_create_folder(package, name).await?;
        cache.insert(name, folder.clone());
        Ok(folder)
    }

    async fn write_error_note(&self, package: &NodeRef, isbn: &Isbn, err: &IngestError) {
        let filename = format!("{}-{}.txt", isbn, chrono::Local::now().format("%Y-%m-%d-%H%M%S"));
        let result = self
            .repository
            .write_content(package, &filename, &mime::TEXT_PLAIN, err.to_string().into_bytes())
            .await;
        match result {
            Ok(node) => info!(note = %node, "Wrote extraction error note"),
            Err(e) => warn!(folder = %package, error = %e, "Could not write extraction error note"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ingest::classifier::{ChapterXmlTaxonomy, EpubTaxonomy};
    use crate::repository::InMemoryRepository;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    /// Entries ending in `/` are written as directory entries
    fn write_zip(dir: &Path, name: &str, entries: &[(&str, &str)]) -> std::path::PathBuf {
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

    async fn package(repo: &InMemoryRepository) -> NodeRef {
        repo.get_or_create_folder(&NodeRef::root(), "9780486282146").await.unwrap()
    }

    #[tokio::test]
    async fn test_extract_routes_entries() {
        let dir = TempDir::new().unwrap();
        let archive = write_zip(
            dir.path(),
            "9780486282146.zip",
            &[
                ("package.opf", "<package/>"),
                ("content/9780486282146-chapter-1.xhtml", "<html/>"),
                ("content/notes.txt", "skip me"),
                ("images/cover.jpg", "jpg"),
            ],
        );
        let repo = Arc::new(InMemoryRepository::new());
        let package = package(&repo).await;
        let extractor = ArchiveExtractor::new(repo.clone(), Arc::new(EpubTaxonomy));

        let report = extractor
            .extract(&archive, &package, &"9780486282146".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(report.files_written, 3);
        assert_eq!(report.skipped, vec!["content/notes.txt".to_string()]);
        let folders: Vec<&str> = report.folders.iter().map(String::as_str).collect();
        assert_eq!(folders, vec!["Artwork", "Chapters"]);
        assert!(repo.get_child(&package, "package.opf").await.unwrap().is_some());
        assert!(repo.get_child(&package, "Supplementary").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_running_directory_follows_directory_entries() {
        let dir = TempDir::new().unwrap();
        let archive = write_zip(
            dir.path(),
            "9780486282146.zip",
            &[
                ("9780486282146/Adobe Chapters/", ""),
                ("9780486282146/Adobe Chapters/9780486282146_Chapter_1.pdf", "%PDF"),
                ("9780486282146/Artwork/", ""),
                ("9780486282146/Artwork/fig1.tif", "tif"),
            ],
        );
        let repo = Arc::new(InMemoryRepository::new());
        let package = package(&repo).await;
        let extractor = ArchiveExtractor::new(repo.clone(), Arc::new(ChapterXmlTaxonomy))
            .with_tracking(DirectoryTracking::RunningDirectory);

        let report = extractor
            .extract(&archive, &package, &"9780486282146".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(report.files_written, 2);
        let chapters = repo.resolve_path("/9780486282146/Adobe Chapters").await.unwrap();
        assert!(repo
            .get_child(&chapters, "9780486282146-chapter1.pdf")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_split_runs_after_shipped_chapter_xml_is_written() {
        let dir = TempDir::new().unwrap();
        let archive = write_zip(
            dir.path(),
            "9780486282146.zip",
            &[
                (
                    "9780486282146/TFB XML/9780486282146.xml",
                    "<book><chapter id=\"c1\"/><chapter id=\"c2\"/></book>",
                ),
                ("9780486282146/Adobe Chapters/9780486282146_Chapter_1.xml", "<chapter>shipped</chapter>"),
            ],
        );
        let repo = Arc::new(InMemoryRepository::new());
        let package = package(&repo).await;
        let extractor = ArchiveExtractor::new(repo.clone(), Arc::new(ChapterXmlTaxonomy))
            .with_splitter(Some(DescriptorSplitter::new()));

        let report = extractor
            .extract(&archive, &package, &"9780486282146".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(report.chapters_split, 1);
        let shipped = repo
            .resolve_path("/9780486282146/Adobe Chapters/9780486282146-chapter1.xml")
            .await
            .unwrap();
        assert_eq!(repo.read_content(&shipped).await.unwrap(), b"<chapter>shipped</chapter>".to_vec());
        assert!(repo
            .resolve_path("/9780486282146/Adobe Chapters/9780486282146-chapter2.xml")
            .await
            .is_ok());
    }

    #[test]
    fn test_running_directory_without_directory_entry_is_root() {
        let extractor = ArchiveExtractor::new(Arc::new(InMemoryRepository::new()), Arc::new(EpubTaxonomy))
            .with_tracking(DirectoryTracking::RunningDirectory);
        assert_eq!(extractor.classification_path("content/c1.xhtml", None), "c1.xhtml");
        assert_eq!(
            extractor.classification_path("content/c1.xhtml", Some("book/images/")),
            "book/images/c1.xhtml"
        );
    }

    #[tokio::test]
    async fn test_corrupt_archive_writes_error_note() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("9780486282146.zip");
        std::fs::write(&archive, b"this is not a zip file").unwrap();
        let repo = Arc::new(InMemoryRepository::new());
        let package = package(&repo).await;
        let extractor = ArchiveExtractor::new(repo.clone(), Arc::new(EpubTaxonomy));

        let err = extractor
            .extract(&archive, &package, &"9780486282146".parse().unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Extraction { ref archive, .. } if archive == "9780486282146.zip"));
        let children = repo.list_children(&package).await.unwrap();
        assert_eq!(children.len(), 1);
        assert!(children[0].name().starts_with("9780486282146-"));
        assert!(children[0].name().ends_with(".txt"));
    }

    #[tokio::test]
    async fn test_error_notes_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("9780486282146.zip");
        std::fs::write(&archive, b"PK broken").unwrap();
        let repo = Arc::new(InMemoryRepository::new());
        let package = package(&repo).await;
        let extractor = ArchiveExtractor::new(repo.clone(), Arc::new(EpubTaxonomy)).with_error_notes(false);

        assert!(extractor
            .extract(&archive, &package, &"9780486282146".parse().unwrap())
            .await
            .is_err());
        assert!(repo.list_children(&package).await.unwrap().is_empty());
    }

    #[test]
    fn test_directory_tracking_from_str() {
        assert_eq!(
            "running-directory".parse::<DirectoryTracking>().unwrap(),
            DirectoryTracking::RunningDirectory
        );
        assert!("by-magic".parse::<DirectoryTracking>().is_err());
    }
}
