//! Ingestion error types
//!
//! Every error is local to the processing of one archive. The orchestrator is
//! the only place they are caught; it logs them with [`IngestError::code`] and
//! quarantines the archive.

use thiserror::Error;

use crate::repository::RepositoryError;

/// Result type alias for ingestion operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Cause of an archive extraction failure
#[derive(Error, Debug)]
pub enum ExtractionCause {
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Archive filename {filename:?} is not an ISBN number")]
    InvalidIdentifier { filename: String },

    #[error("Error extracting content ZIP {archive} [error={source}]")]
    Extraction {
        archive: String,
        #[source]
        source: ExtractionCause,
    },

    #[error("Could not create new ISBN folder for {isbn} under {parent}: {source}")]
    PackageCreation {
        isbn: String,
        parent: String,
        #[source]
        source: RepositoryError,
    },

    #[error("Missing complete content XML file [{filename}] in {folder}")]
    MissingDescriptor { filename: String, folder: String },

    #[error("There are [{pdf_count}] PDF files but [{xml_count}] XML files in {folder}")]
    ChapterCountMismatch {
        folder: String,
        pdf_count: usize,
        xml_count: usize,
    },

    #[error("Could not split content XML {filename} into chapters: {reason}")]
    DescriptorSplit { filename: String, reason: String },

    #[error("ISBN {isbn} has already been published and republishing is disabled")]
    RepublishRejected { isbn: String },

    #[error("ISBN {isbn} has an interrupted ingestion and recovery is disabled")]
    InterruptedRejected { isbn: String },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl IngestError {
    /// Stable processing error code, used as a structured log field
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::InvalidIdentifier { .. } => "content_ingestion_invalid_isbn",
            IngestError::Extraction { .. } => "content_ingestion_extract_zip",
            IngestError::PackageCreation { .. } => "content_ingestion_create_folder",
            IngestError::MissingDescriptor { .. } => "content_checker_handle_xml_file",
            IngestError::ChapterCountMismatch { .. } => "content_checker_chapter_files_mismatch",
            IngestError::DescriptorSplit { .. } => "content_checker_split_xml_file",
            IngestError::RepublishRejected { .. } => "content_ingestion_republish_rejected",
            IngestError::InterruptedRejected { .. } => "content_ingestion_interrupted_rejected",
            IngestError::Repository(_) => "content_ingestion_repository",
        }
    }

    pub(crate) fn extraction(archive: impl Into<String>, source: impl Into<ExtractionCause>) -> Self {
        IngestError::Extraction {
            archive: archive.into(),
            source: source.into(),
        }
    }
}
