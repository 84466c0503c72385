//! BestPub Ingest Library
//!
//! Picks up `{isbn}.zip` book packages from a directory, sorts their files
//! into package folders in a content repository and tracks every package's
//! ingestion status so interrupted or repeated deliveries can be recognised.
//!
//! # Example
//!
//! ```no_run
//! use bestpub_ingest::{config::IngestConfig, ingest::IngestOrchestrator, repository::FsRepository};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let repository = Arc::new(FsRepository::open(&config.repository_root).await?);
//!     let orchestrator = IngestOrchestrator::from_config(&config, repository);
//!     let summary = orchestrator.run().await;
//!     println!("{} archives ingested", summary.succeeded);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod repository;

pub use error::{IngestError, IngestResult};
