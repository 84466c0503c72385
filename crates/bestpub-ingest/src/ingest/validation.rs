//! Structural completeness checks for chapter-xml packages
//!
//! Before a chapter-xml package may be marked complete, the master content
//! XML `{isbn}.xml` must be present in `TFB XML`, and the `Adobe Chapters`
//! folder must hold as many chapter XML files as chapter PDFs (and at least
//! one of each).

use bestpub_common::content_type::{is_pdf, is_xml};
use bestpub_common::Isbn;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::{IngestError, IngestResult};
use crate::ingest::classifier::{ADOBE_CHAPTERS_FOLDER_NAME, TFB_XML_FOLDER_NAME};
use crate::repository::{ContentRepository, NodeRef};

/// PDF and XML counts found in the chapters folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChapterCounts {
    pub pdf: usize,
    pub xml: usize,
}

pub struct PackageValidator {
    repository: Arc<dyn ContentRepository>,
}

impl PackageValidator {
    pub fn new(repository: Arc<dyn ContentRepository>) -> Self {
        Self { repository }
    }

    /// Run both checks; the package is left untouched either way
    pub async fn validate(&self, package: &NodeRef, isbn: &Isbn) -> IngestResult<ChapterCounts> {
        self.validate_descriptor(package, isbn).await?;
        self.validate_chapter_files(package).await
    }

    /// `{isbn}.xml` (any case) must exist in the `TFB XML` folder
    pub async fn validate_descriptor(&self, package: &NodeRef, isbn: &Isbn) -> IngestResult<()> {
        let filename = descriptor_filename(isbn);
        let missing = || IngestError::MissingDescriptor {
            filename: filename.clone(),
            folder: TFB_XML_FOLDER_NAME.to_string(),
        };

        let folder = self
            .repository
            .get_child(package, TFB_XML_FOLDER_NAME)
            .await?
            .ok_or_else(missing)?;
        let found = self
            .repository
            .list_children(&folder)
            .await?
            .iter()
            .any(|child| !child.node_type.is_folder() && is_descriptor_filename(isbn, child.name()));
        if !found {
            return Err(missing());
        }
        Ok(())
    }

    /// The chapters folder must hold N PDF and N XML files, N > 0
    pub async fn validate_chapter_files(&self, package: &NodeRef) -> IngestResult<ChapterCounts> {
        let counts = match self.repository.get_child(package, ADOBE_CHAPTERS_FOLDER_NAME).await? {
            Some(folder) => self.count_chapter_files(&folder).await?,
            None => ChapterCounts::default(),
        };
        debug!(folder = %package, pdf = counts.pdf, xml = counts.xml, "Counted chapter files");

        if counts.pdf == 0 || counts.pdf != counts.xml {
            return Err(IngestError::ChapterCountMismatch {
                folder: ADOBE_CHAPTERS_FOLDER_NAME.to_string(),
                pdf_count: counts.pdf,
                xml_count: counts.xml,
            });
        }
        Ok(counts)
    }

    async fn count_chapter_files(&self, folder: &NodeRef) -> IngestResult<ChapterCounts> {
        let mut counts = ChapterCounts::default();
        for child in self.repository.list_children(folder).await? {
            match child.content_type {
                Some(ref content_type) if is_pdf(content_type) => counts.pdf += 1,
                Some(ref content_type) if is_xml(content_type) => counts.xml += 1,
                _ => {},
            }
        }
        Ok(counts)
    }
}

/// Name of the master content XML for `isbn`
pub fn descriptor_filename(isbn: &Isbn) -> String {
    format!("{}.xml", isbn)
}

/// Whether `filename` names the master content XML, ignoring case
pub fn is_descriptor_filename(isbn: &Isbn, filename: &str) -> bool {
    filename.eq_ignore_ascii_case(&descriptor_filename(isbn))
}
