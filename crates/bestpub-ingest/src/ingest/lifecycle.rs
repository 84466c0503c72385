//! Package lifecycle
//!
//! A package folder is created `IN_PROGRESS` together with its ISBN
//! properties and only flips to `COMPLETE` once everything in the archive has
//! been written and validated. Comparing the existing folder (if any) with
//! that status tells a new package from a republish or from an ingestion that
//! was killed halfway through.

use bestpub_common::{IngestionStatus, Isbn};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{IngestError, IngestResult};
use crate::repository::{
    ContentRepository, NodeRef, NodeType, Properties, PROP_INGESTION_STATUS, PROP_ISBN, PROP_NAME,
};

/// Folder under the content folder that republished packages are staged in
pub const REPUBLISH_FOLDER_NAME: &str = "Republish";

/// How an incoming archive relates to what is already in the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// No package folder exists yet
    New,
    /// A `COMPLETE` package folder exists
    Republish,
    /// A package folder exists but never reached `COMPLETE`
    Interrupted,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::New => "new",
            Disposition::Republish => "republish",
            Disposition::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`PackageLifecycle::resolve_disposition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub disposition: Disposition,
    /// The content folder for a new package, the existing package folder otherwise
    pub target: NodeRef,
}

/// What to do with an archive whose ISBN is already `COMPLETE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepublishPolicy {
    /// Ingest into `Republish/{isbn}`, replacing an earlier staged copy
    Stage,
    /// Fail the archive
    Reject,
}

impl FromStr for RepublishPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stage" => Ok(RepublishPolicy::Stage),
            "reject" => Ok(RepublishPolicy::Reject),
            _ => Err(format!("Unknown republish policy {:?}, expected 'stage' or 'reject'", s)),
        }
    }
}

/// What to do with an archive whose ISBN folder was left `IN_PROGRESS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptedPolicy {
    /// Delete the stale folder and ingest from scratch
    Recreate,
    /// Fail the archive and leave the folder for an operator
    Reject,
}

impl FromStr for InterruptedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recreate" => Ok(InterruptedPolicy::Recreate),
            "reject" => Ok(InterruptedPolicy::Reject),
            _ => Err(format!(
                "Unknown interrupted policy {:?}, expected 'recreate' or 'reject'",
                s
            )),
        }
    }
}

/// Creates, inspects and completes package folders
#[derive(Clone)]
pub struct PackageLifecycle {
    repository: Arc<dyn ContentRepository>,
    republish_policy: RepublishPolicy,
    interrupted_policy: InterruptedPolicy,
}

impl PackageLifecycle {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        republish_policy: RepublishPolicy,
        interrupted_policy: InterruptedPolicy,
    ) -> Self {
        Self {
            repository,
            republish_policy,
            interrupted_policy,
        }
    }

    /// Decide whether `isbn` is new, a republish or an interrupted ingestion.
    ///
    /// Only fails if the repository lookup itself fails.
    pub async fn resolve_disposition(&self, content_folder: &NodeRef, isbn: &Isbn) -> IngestResult<Resolution> {
        let Some(existing) = self.repository.get_child(content_folder, isbn.as_str()).await? else {
            return Ok(Resolution {
                disposition: Disposition::New,
                target: content_folder.clone(),
            });
        };

        let disposition = match self.status(&existing).await? {
            Some(IngestionStatus::Complete) => Disposition::Republish,
            _ => Disposition::Interrupted,
        };
        debug!(isbn = %isbn, folder = %existing, %disposition, "Resolved disposition");

        Ok(Resolution {
            disposition,
            target: existing,
        })
    }

    /// Apply the recovery policy for `resolution` and return the folder the
    /// new package folder must be created under
    pub async fn prepare_parent(
        &self,
        content_folder: &NodeRef,
        resolution: &Resolution,
        isbn: &Isbn,
    ) -> IngestResult<NodeRef> {
        match resolution.disposition {
            Disposition::New => Ok(content_folder.clone()),
            Disposition::Interrupted => match self.interrupted_policy {
                InterruptedPolicy::Recreate => {
                    warn!(
                        isbn = %isbn,
                        folder = %resolution.target,
                        "Deleting package folder left IN_PROGRESS by an interrupted ingestion"
                    );
                    self.repository.delete_node(&resolution.target).await?;
                    Ok(content_folder.clone())
                },
                InterruptedPolicy::Reject => Err(IngestError::InterruptedRejected {
                    isbn: isbn.to_string(),
                }),
            },
            Disposition::Republish => match self.republish_policy {
                RepublishPolicy::Stage => {
                    let republish = self
                        .repository
                        .get_or_create_folder(content_folder, REPUBLISH_FOLDER_NAME)
                        .await?;
                    if let Some(previous) = self.repository.get_child(&republish, isbn.as_str()).await? {
                        info!(isbn = %isbn, folder = %previous, "Replacing previously staged republish");
                        self.repository.delete_node(&previous).await?;
                    }
                    Ok(republish)
                },
                RepublishPolicy::Reject => Err(IngestError::RepublishRejected {
                    isbn: isbn.to_string(),
                }),
            },
        }
    }

    /// Create the package folder, `IN_PROGRESS`, with its name and ISBN set
    pub async fn create_package_folder(&self, parent: &NodeRef, isbn: &Isbn) -> IngestResult<NodeRef> {
        debug!(isbn = %isbn, parent = %parent, "Creating package folder");

        let mut properties = Properties::new();
        properties.insert(PROP_NAME.to_string(), isbn.to_string());
        properties.insert(PROP_ISBN.to_string(), isbn.to_string());
        properties.insert(
            PROP_INGESTION_STATUS.to_string(),
            IngestionStatus::InProgress.to_string(),
        );

        self.repository
            .create_child(parent, isbn.as_str(), NodeType::PackageFolder, properties)
            .await
            .map_err(|source| IngestError::PackageCreation {
                isbn: isbn.to_string(),
                parent: parent.to_string(),
                source,
            })
    }

    /// Flip the package to `COMPLETE`
    pub async fn mark_complete(&self, package: &NodeRef) -> IngestResult<()> {
        self.repository
            .set_property(package, PROP_INGESTION_STATUS, IngestionStatus::Complete.as_str())
            .await?;
        info!(folder = %package, "Package marked COMPLETE");
        Ok(())
    }

    /// Recorded status of a package folder; `None` if absent or unreadable
    pub async fn status(&self, package: &NodeRef) -> IngestResult<Option<IngestionStatus>> {
        let raw = self
            .repository
            .get_property(package, PROP_INGESTION_STATUS)
            .await?;
        Ok(raw.and_then(|value| value.parse().ok()))
    }
}
