//! Error types shared across the BestPub crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Main error type for shared BestPub functionality
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Invalid ISBN: {0:?} is not a 13 digit product code")]
    InvalidIsbn(String),

    #[error("Invalid ingestion status: {0}")]
    InvalidStatus(String),
}
