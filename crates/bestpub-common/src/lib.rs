//! BestPub Common Library
//!
//! Shared types, utilities, and error handling for the BestPub content
//! ingestion workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Types**: the [`Isbn`] package identifier and the [`IngestionStatus`]
//!   lifecycle recorded on every package folder
//! - **Content types**: MIME lookup for files written into the repository
//!
//! # Example
//!
//! ```no_run
//! use bestpub_common::{Isbn, Result};
//!
//! fn package_name(archive_stem: &str) -> Result<String> {
//!     let isbn: Isbn = archive_stem.parse()?;
//!     Ok(isbn.to_string())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod content_type;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{IngestionStatus, Isbn};
