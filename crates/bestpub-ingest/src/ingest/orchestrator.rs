//! Ingestion orchestrator
//!
//! Scans the source directory and pushes every archive through
//!
//! ```text
//! discovered -> name validated -> disposition resolved -> extracted -> validated -> completed
//! ```
//!
//! Archives are processed one after another. A failure at any stage is
//! logged with the stage and error code, and the archive is moved to
//! quarantine; successful archives are deleted. [`IngestOrchestrator::run`]
//! never returns an error.

use bestpub_common::Isbn;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

use super::disposal::{archive_stem, delete_archive, discover_archives, quarantine_archive};
use super::extractor::{ArchiveExtractor, ExtractionReport};
use super::lifecycle::{Disposition, PackageLifecycle};
use super::splitter::DescriptorSplitter;
use super::stats::{RunSummary, StatsHandle};
use super::validation::PackageValidator;
use crate::config::IngestConfig;
use crate::error::{IngestError, IngestResult};
use crate::repository::{ensure_folder_path, ContentRepository, NodeRef};

/// Processing stage an archive failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NameValidation,
    DispositionResolution,
    Extraction,
    Validation,
    Completion,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::NameValidation => "name_validation",
            Stage::DispositionResolution => "disposition_resolution",
            Stage::Extraction => "extraction",
            Stage::Validation => "validation",
            Stage::Completion => "completion",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A package that made it to `COMPLETE`
#[derive(Debug, Clone)]
pub struct IngestedPackage {
    pub isbn: Isbn,
    pub disposition: Disposition,
    pub folder: NodeRef,
    pub report: ExtractionReport,
}

/// Why an archive failed
#[derive(Debug)]
pub struct ArchiveFailure {
    pub stage: Stage,
    pub error: IngestError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, ArchiveFailure>;
}

impl<T, E: Into<IngestError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, ArchiveFailure> {
        self.map_err(|e| ArchiveFailure {
            stage,
            error: e.into(),
        })
    }
}

/// Where the orchestrator reads from and writes to
#[derive(Debug, Clone)]
pub struct OrchestratorPaths {
    pub source_dir: PathBuf,
    pub quarantine_dir: PathBuf,
    /// Repository path of the content folder
    pub content_folder_path: String,
}

pub struct IngestOrchestrator {
    repository: Arc<dyn ContentRepository>,
    lifecycle: PackageLifecycle,
    extractor: ArchiveExtractor,
    validator: Option<PackageValidator>,
    paths: OrchestratorPaths,
    stats: StatsHandle,
}

impl IngestOrchestrator {
    /// Create new orchestrator
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        lifecycle: PackageLifecycle,
        extractor: ArchiveExtractor,
        paths: OrchestratorPaths,
    ) -> Self {
        let validator = extractor
            .taxonomy()
            .requires_validation()
            .then(|| PackageValidator::new(repository.clone()));
        Self {
            repository,
            lifecycle,
            extractor,
            validator,
            paths,
            stats: StatsHandle::new(),
        }
    }

    /// Wire up an orchestrator from configuration
    pub fn from_config(config: &IngestConfig, repository: Arc<dyn ContentRepository>) -> Self {
        let pipeline = &config.pipeline;
        let lifecycle = PackageLifecycle::new(
            repository.clone(),
            pipeline.republish_policy,
            pipeline.interrupted_policy,
        );
        let extractor = ArchiveExtractor::new(repository.clone(), pipeline.taxonomy.build())
            .with_tracking(pipeline.directory_tracking)
            .with_splitter(pipeline.split_descriptor.then(DescriptorSplitter::new))
            .with_error_notes(pipeline.write_error_notes);
        let paths = OrchestratorPaths {
            source_dir: config.source_dir.clone(),
            quarantine_dir: config.quarantine_dir.clone(),
            content_folder_path: config.content_folder_path.clone(),
        };
        Self::new(repository, lifecycle, extractor, paths)
    }

    /// Handle to the run statistics this orchestrator updates
    pub fn stats(&self) -> StatsHandle {
        self.stats.clone()
    }

    pub fn paths(&self) -> &OrchestratorPaths {
        &self.paths
    }

    /// Run one ingestion cycle over the source directory
    pub async fn run(&self) -> RunSummary {
        self.stats.begin_run().await;
        info!(source = %self.paths.source_dir.display(), "Starting ingestion cycle");

        let archives = match discover_archives(&self.paths.source_dir).await {
            Ok(archives) => archives,
            Err(e) => {
                error!(
                    source = %self.paths.source_dir.display(),
                    error = %e,
                    "Could not read source directory, skipping cycle"
                );
                let summary = RunSummary::default();
                self.stats.end_run(summary).await;
                return summary;
            },
        };

        let mut summary = RunSummary {
            discovered: archives.len(),
            ..RunSummary::default()
        };
        self.stats.set_queue_size(archives.len()).await;
        info!(count = archives.len(), "Discovered archives");

        let mut content_folder = None;
        for archive in archives {
            let name = archive
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let span = info_span!("archive", archive = %name);

            let succeeded = self
                .process_and_dispose(&archive, &mut content_folder)
                .instrument(span)
                .await;
            if succeeded {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            self.stats.archive_done(succeeded).await;
        }

        self.stats.end_run(summary).await;
        info!(
            discovered = summary.discovered,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Ingestion cycle completed"
        );
        summary
    }

    async fn process_and_dispose(&self, archive: &Path, content_folder: &mut Option<NodeRef>) -> bool {
        match self.process_archive(archive, content_folder).await {
            Ok(package) => {
                info!(
                    isbn = %package.isbn,
                    disposition = %package.disposition,
                    folder = %package.folder,
                    files = package.report.files_written,
                    "Archive ingested"
                );
                if let Err(e) = delete_archive(archive).await {
                    error!(error = %e, "Could not delete ingested archive");
                }
                true
            },
            Err(failure) => {
                error!(
                    stage = %failure.stage,
                    code = failure.error.code(),
                    error = %failure.error,
                    "Archive ingestion failed"
                );
                match quarantine_archive(archive, &self.paths.quarantine_dir).await {
                    Ok(target) => warn!(target = %target.display(), "Archive moved to quarantine"),
                    Err(e) => error!(error = %e, "Could not move archive to quarantine"),
                }
                false
            },
        }
    }

    /// Push one archive through every stage
    pub async fn process_archive(
        &self,
        archive: &Path,
        content_folder: &mut Option<NodeRef>,
    ) -> Result<IngestedPackage, ArchiveFailure> {
        let stem = archive_stem(archive);
        let isbn: Isbn = stem
            .parse()
            .map_err(|_| IngestError::InvalidIdentifier { filename: stem.clone() })
            .at(Stage::NameValidation)?;

        let content_folder = self
            .content_folder(content_folder)
            .await
            .at(Stage::DispositionResolution)?;
        let resolution = self
            .lifecycle
            .resolve_disposition(&content_folder, &isbn)
            .await
            .at(Stage::DispositionResolution)?;
        info!(isbn = %isbn, disposition = %resolution.disposition, "Resolved disposition");
        let parent = self
            .lifecycle
            .prepare_parent(&content_folder, &resolution, &isbn)
            .await
            .at(Stage::DispositionResolution)?;

        let package = self
            .lifecycle
            .create_package_folder(&parent, &isbn)
            .await
            .at(Stage::Extraction)?;
        let report = self
            .extractor
            .extract(archive, &package, &isbn)
            .await
            .at(Stage::Extraction)?;

        if let Some(validator) = &self.validator {
            validator.validate(&package, &isbn).await.at(Stage::Validation)?;
        }

        self.lifecycle.mark_complete(&package).await.at(Stage::Completion)?;

        Ok(IngestedPackage {
            isbn,
            disposition: resolution.disposition,
            folder: package,
            report,
        })
    }

    /// Resolve (creating if needed) the content folder once per run
    async fn content_folder(&self, cached: &mut Option<NodeRef>) -> IngestResult<NodeRef> {
        if let Some(folder) = cached {
            return Ok(folder.clone());
        }
        let folder = ensure_folder_path(self.repository.as_ref(), &self.paths.content_folder_path).await?;
        *cached = Some(folder.clone());
        Ok(folder)
    }
}
