//! Common types used across BestPub

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::CommonError;

static ISBN_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    regex::Regex::new(r"^\d{13}$").expect("ISBN pattern is a valid regex")
});

/// ISBN-13 product code identifying a book package.
///
/// The same value is used as the archive filename stem and as the name of the
/// package folder in the content repository. Only the shape (13 ASCII digits)
/// is enforced; publishers occasionally ship pre-assigned codes whose check
/// digit does not verify, so [`Isbn::has_valid_check_digit`] is informational.
///
/// # Examples
///
/// ```
/// use bestpub_common::Isbn;
///
/// let isbn: Isbn = "9780486282145".parse().unwrap();
/// assert_eq!(isbn.as_str(), "9780486282145");
/// assert!("not-a-real-isbn".parse::<Isbn>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isbn(String);

impl Isbn {
    /// Returns true if the value has the shape of an ISBN-13
    pub fn is_isbn(candidate: &str) -> bool {
        ISBN_PATTERN.is_match(candidate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify the ISBN-13 check digit (alternating 1/3 weights, sum mod 10)
    pub fn has_valid_check_digit(&self) -> bool {
        let sum: u32 = self
            .0
            .bytes()
            .enumerate()
            .map(|(i, b)| {
                let digit = u32::from(b - b'0');
                if i % 2 == 0 {
                    digit
                } else {
                    digit * 3
                }
            })
            .sum();
        sum % 10 == 0
    }
}

impl FromStr for Isbn {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_isbn(s) {
            Ok(Isbn(s.to_string()))
        } else {
            Err(CommonError::InvalidIsbn(s.to_string()))
        }
    }
}

impl TryFrom<String> for Isbn {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Isbn> for String {
    fn from(isbn: Isbn) -> Self {
        isbn.0
    }
}

impl AsRef<str> for Isbn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Isbn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ingestion status recorded on a package folder.
///
/// A package is `IN_PROGRESS` from the moment its folder is created until all
/// of its files have been written and validated. Downstream consumers must
/// only pick up `COMPLETE` packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestionStatus {
    InProgress,
    Complete,
}

impl IngestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStatus::InProgress => "IN_PROGRESS",
            IngestionStatus::Complete => "COMPLETE",
        }
    }
}

impl FromStr for IngestionStatus {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(IngestionStatus::InProgress),
            "COMPLETE" => Ok(IngestionStatus::Complete),
            _ => Err(CommonError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
