//! Named job lock shared between nodes
//!
//! A lock is a file `{lock_dir}/{name}.lock` created with create-new
//! semantics, so on a shared directory only one node can hold it. The guard
//! removes the file when dropped. A lock file older than the TTL is treated as
//! left behind by a crashed node and broken.

use chrono::Utc;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FileJobLock {
    path: PathBuf,
    ttl: Duration,
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct JobLockGuard {
    path: PathBuf,
}

impl JobLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobLockGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(lock = %self.path.display(), "Released job lock"),
            Err(e) if e.kind() == ErrorKind::NotFound => {},
            Err(e) => warn!(lock = %self.path.display(), error = %e, "Could not release job lock"),
        }
    }
}

impl FileJobLock {
    pub fn new(lock_dir: impl AsRef<Path>, name: &str, ttl: Duration) -> Self {
        Self {
            path: lock_dir.as_ref().join(format!("{}.lock", name)),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the lock, or return `None` if another holder has it
    pub async fn try_acquire(&self) -> io::Result<Option<JobLockGuard>> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }

        for _ in 0..2 {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
                .await
            {
                Ok(mut file) => {
                    let owner = format!("pid={} acquired={}\n", std::process::id(), Utc::now().to_rfc3339());
                    file.write_all(owner.as_bytes()).await?;
                    file.flush().await?;
                    debug!(lock = %self.path.display(), "Acquired job lock");
                    return Ok(Some(JobLockGuard {
                        path: self.path.clone(),
                    }));
                },
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !self.is_stale().await? {
                        return Ok(None);
                    }
                    warn!(lock = %self.path.display(), ttl_secs = self.ttl.as_secs(), "Breaking stale job lock");
                    match fs::remove_file(&self.path).await {
                        Ok(()) => {},
                        Err(e) if e.kind() == ErrorKind::NotFound => {},
                        Err(e) => return Err(e),
                    }
                },
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    async fn is_stale(&self) -> io::Result<bool> {
        let modified = match fs::metadata(&self.path).await {
            Ok(metadata) => metadata.modified()?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e),
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        Ok(age >= self.ttl)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lock_is_exclusive_until_dropped() {
        let dir = TempDir::new().unwrap();
        let lock = FileJobLock::new(dir.path(), "content-ingestion", Duration::from_secs(3600));

        let guard = lock.try_acquire().await.unwrap().expect("first acquire");
        assert!(guard.path().exists());
        assert!(lock.try_acquire().await.unwrap().is_none());

        drop(guard);
        assert!(!lock.path().exists());
        assert!(lock.try_acquire().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stale_lock_is_broken() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("content-ingestion.lock"), b"pid=1").unwrap();
        let lock = FileJobLock::new(dir.path(), "content-ingestion", Duration::ZERO);

        let guard = lock.try_acquire().await.unwrap();
        assert!(guard.is_some());
    }

    #[tokio::test]
    async fn test_creates_lock_directory() {
        let dir = TempDir::new().unwrap();
        let lock = FileJobLock::new(dir.path().join("locks/shared"), "job", Duration::from_secs(60));
        assert!(lock.try_acquire().await.unwrap().is_some());
    }
}
