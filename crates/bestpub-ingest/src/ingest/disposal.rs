//! Source directory handling: discovering archives and disposing of them
//!
//! Every processed archive leaves the source directory: deleted on success,
//! moved to the quarantine directory on failure.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const ARCHIVE_EXTENSION: &str = "zip";

/// List `*.zip` files (extension matched case-insensitively) in `source_dir`, sorted by name
pub async fn discover_archives(source_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(source_dir).await?;
    let mut archives = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_archive = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION));
        if is_archive {
            archives.push(path);
        }
    }

    archives.sort();
    Ok(archives)
}

/// Archive filename without its extension
pub fn archive_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub async fn delete_archive(path: &Path) -> io::Result<()> {
    fs::remove_file(path).await?;
    debug!(archive = %path.display(), "Deleted source archive");
    Ok(())
}

/// Move `path` into `quarantine_dir` and return its new location.
///
/// An existing file of the same name is kept; the incoming one gets a
/// timestamp suffix instead.
pub async fn quarantine_archive(path: &Path, quarantine_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(quarantine_dir).await?;

    let filename = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "archive path has no file name"))?;
    let mut target = quarantine_dir.join(filename);
    if fs::try_exists(&target).await? {
        let suffix = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
        let renamed = match path.extension() {
            Some(ext) => format!("{}-{}.{}", archive_stem(path), suffix, ext.to_string_lossy()),
            None => format!("{}-{}", archive_stem(path), suffix),
        };
        target = quarantine_dir.join(renamed);
    }

    if let Err(e) = fs::rename(path, &target).await {
        // Quarantine may live on another filesystem
        warn!(archive = %path.display(), error = %e, "Rename failed, copying instead");
        fs::copy(path, &target).await?;
        fs::remove_file(path).await?;
    }

    debug!(archive = %path.display(), target = %target.display(), "Moved archive to quarantine");
    Ok(target)
}
