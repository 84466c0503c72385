//! Content ingestion pipeline
//!
//! Leaf-first:
//!
//! - [`classifier`]: maps archive entry paths to package folders
//! - [`splitter`]: cuts the master content XML into chapter XML files
//! - [`extractor`]: writes archive entries into a package folder
//! - [`lifecycle`]: package folder creation, status and disposition
//! - [`validation`]: descriptor and chapter count checks
//! - [`orchestrator`]: scan, process and dispose of archives
//! - [`scheduler`] and [`lock`]: cron-driven runs under a cluster lock

pub mod classifier;
pub mod disposal;
pub mod extractor;
pub mod lifecycle;
pub mod lock;
pub mod orchestrator;
pub mod scheduler;
pub mod splitter;
pub mod stats;
pub mod validation;

pub use classifier::{Category, ClassifiedEntry, ContentTaxonomy, Destination, Taxonomy};
pub use extractor::{ArchiveExtractor, DirectoryTracking, ExtractionReport};
pub use lifecycle::{Disposition, InterruptedPolicy, PackageLifecycle, RepublishPolicy, Resolution};
pub use orchestrator::{IngestOrchestrator, OrchestratorPaths, Stage};
pub use scheduler::JobScheduler;
pub use stats::{RunStats, RunSummary, StatsHandle};
