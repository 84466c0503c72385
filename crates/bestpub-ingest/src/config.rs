//! Ingestion configuration
//!
//! Configuration for the content ingestion job: where archives are picked up,
//! where packages are written, when the job fires and which content taxonomy
//! it applies. Loaded from `INGEST_*` environment variables (and `.env`).

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ingest::classifier::Taxonomy;
use crate::ingest::extractor::DirectoryTracking;
use crate::ingest::lifecycle::{InterruptedPolicy, RepublishPolicy};

const DEFAULT_CONTENT_FOLDER_PATH: &str = "/Company Home/Data Dictionary/BestPub/Incoming/Content";
const DEFAULT_CRON: &str = "0 */5 * * * *";

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory scanned for `{isbn}.zip` archives
    pub source_dir: PathBuf,
    /// Directory failed archives are moved to (default: `{source_dir}/failed`)
    pub quarantine_dir: PathBuf,
    /// Repository path of the folder package folders are created under
    pub content_folder_path: String,
    /// On-disk root of the filesystem repository
    pub repository_root: PathBuf,
    pub schedule: ScheduleConfig,
    pub pipeline: PipelineConfig,
    pub api: ApiConfig,
}

/// When and as whom the job runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Six-field cron expression (seconds first)
    pub cron: String,
    /// Delay before the first tick, in seconds
    pub start_delay_secs: u64,
    /// Principal recorded on every scheduled run
    pub run_as: String,
    /// Shared directory holding cluster lock files
    pub lock_dir: PathBuf,
    pub lock_name: String,
    /// Age after which a lock file is considered abandoned, in seconds
    pub lock_ttl_secs: u64,
}

/// How archives are classified and recovered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub taxonomy: Taxonomy,
    pub directory_tracking: DirectoryTracking,
    pub republish_policy: RepublishPolicy,
    pub interrupted_policy: InterruptedPolicy,
    /// Write a timestamped note into the package folder when extraction fails
    pub write_error_notes: bool,
    /// Split the master content XML into per-chapter XML files
    pub split_descriptor: bool,
}

/// Read-only introspection server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: DEFAULT_CRON.to_string(),
            start_delay_secs: 60,
            run_as: "system".to_string(),
            lock_dir: PathBuf::from("./data/locks"),
            lock_name: "content-ingestion".to_string(),
            lock_ttl_secs: 3600,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            taxonomy: Taxonomy::Epub,
            directory_tracking: DirectoryTracking::PathDerived,
            republish_policy: RepublishPolicy::Stage,
            interrupted_policy: InterruptedPolicy::Recreate,
            write_error_notes: true,
            split_descriptor: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        let source_dir = PathBuf::from("./data/incoming");
        Self {
            quarantine_dir: source_dir.join("failed"),
            source_dir,
            content_folder_path: DEFAULT_CONTENT_FOLDER_PATH.to_string(),
            repository_root: PathBuf::from("./data/repository"),
            schedule: ScheduleConfig::default(),
            pipeline: PipelineConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}: {}", key, e)),
        None => Ok(default),
    }
}

impl IngestConfig {
    /// Load ingestion configuration from `.env` and environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let source_dir = env_var("INGEST_SOURCE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.source_dir);
        let quarantine_dir = env_var("INGEST_QUARANTINE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| source_dir.join("failed"));

        let schedule = ScheduleConfig {
            cron: env_var("INGEST_CRON").unwrap_or(defaults.schedule.cron),
            start_delay_secs: env_parse("INGEST_START_DELAY_SECS", defaults.schedule.start_delay_secs)?,
            run_as: env_var("INGEST_RUN_AS").unwrap_or(defaults.schedule.run_as),
            lock_dir: env_var("INGEST_LOCK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.schedule.lock_dir),
            lock_name: env_var("INGEST_LOCK_NAME").unwrap_or(defaults.schedule.lock_name),
            lock_ttl_secs: env_parse("INGEST_LOCK_TTL_SECS", defaults.schedule.lock_ttl_secs)?,
        };

        let pipeline = PipelineConfig {
            taxonomy: env_parse("INGEST_TAXONOMY", defaults.pipeline.taxonomy)?,
            directory_tracking: env_parse(
                "INGEST_DIRECTORY_TRACKING",
                defaults.pipeline.directory_tracking,
            )?,
            republish_policy: env_parse("INGEST_REPUBLISH_POLICY", defaults.pipeline.republish_policy)?,
            interrupted_policy: env_parse(
                "INGEST_INTERRUPTED_POLICY",
                defaults.pipeline.interrupted_policy,
            )?,
            write_error_notes: env_parse("INGEST_WRITE_ERROR_NOTES", defaults.pipeline.write_error_notes)?,
            split_descriptor: env_parse("INGEST_SPLIT_DESCRIPTOR", defaults.pipeline.split_descriptor)?,
        };

        let api = ApiConfig {
            enabled: env_parse("INGEST_API_ENABLED", defaults.api.enabled)?,
            host: env_var("INGEST_API_HOST").unwrap_or(defaults.api.host),
            port: env_parse("INGEST_API_PORT", defaults.api.port)?,
        };

        let config = Self {
            source_dir,
            quarantine_dir,
            content_folder_path: env_var("INGEST_CONTENT_FOLDER_PATH")
                .unwrap_or(defaults.content_folder_path),
            repository_root: env_var("INGEST_REPOSITORY_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.repository_root),
            schedule,
            pipeline,
            api,
        };

        config.validate().context("Invalid ingestion configuration")?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.source_dir.as_os_str().is_empty() {
            anyhow::bail!("INGEST_SOURCE_DIR must not be empty");
        }
        if self.quarantine_dir == self.source_dir {
            anyhow::bail!("INGEST_QUARANTINE_DIR must differ from INGEST_SOURCE_DIR");
        }
        if !self.content_folder_path.starts_with('/') {
            anyhow::bail!(
                "INGEST_CONTENT_FOLDER_PATH must be an absolute repository path, got {:?}",
                self.content_folder_path
            );
        }
        cron::Schedule::from_str(&self.schedule.cron)
            .map_err(|e| anyhow::anyhow!("INGEST_CRON {:?} is invalid: {}", self.schedule.cron, e))?;
        if self.schedule.lock_name.is_empty() || self.schedule.lock_name.contains('/') {
            anyhow::bail!("INGEST_LOCK_NAME must be a plain file name");
        }
        if self.schedule.lock_ttl_secs == 0 {
            anyhow::bail!("INGEST_LOCK_TTL_SECS must be greater than 0");
        }
        if self.api.enabled && self.api.port == 0 {
            anyhow::bail!("INGEST_API_PORT must be greater than 0");
        }
        Ok(())
    }

    /// Get start delay as Duration
    pub fn start_delay(&self) -> Duration {
        Duration::from_secs(self.schedule.start_delay_secs)
    }

    /// Get lock TTL as Duration
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.schedule.lock_ttl_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "INGEST_SOURCE_DIR",
        "INGEST_QUARANTINE_DIR",
        "INGEST_CONTENT_FOLDER_PATH",
        "INGEST_CRON",
        "INGEST_START_DELAY_SECS",
        "INGEST_TAXONOMY",
        "INGEST_REPUBLISH_POLICY",
        "INGEST_API_PORT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.quarantine_dir, PathBuf::from("./data/incoming/failed"));
        assert_eq!(config.content_folder_path, DEFAULT_CONTENT_FOLDER_PATH);
        assert_eq!(config.schedule.cron, "0 */5 * * * *");
        assert_eq!(config.start_delay(), Duration::from_secs(60));
        assert_eq!(config.pipeline.taxonomy, Taxonomy::Epub);
        assert_eq!(config.pipeline.directory_tracking, DirectoryTracking::PathDerived);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_cron() {
        let mut config = IngestConfig::default();
        config.schedule.cron = "every five minutes".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_content_path() {
        let mut config = IngestConfig::default();
        config.content_folder_path = "Company Home/Content".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_quarantine_equal_to_source() {
        let mut config = IngestConfig::default();
        config.quarantine_dir = config.source_dir.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("INGEST_SOURCE_DIR", "/srv/incoming");
        std::env::set_var("INGEST_TAXONOMY", "chapter-xml");
        std::env::set_var("INGEST_REPUBLISH_POLICY", "reject");
        std::env::set_var("INGEST_START_DELAY_SECS", "5");

        let config = IngestConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.source_dir, PathBuf::from("/srv/incoming"));
        assert_eq!(config.quarantine_dir, PathBuf::from("/srv/incoming/failed"));
        assert_eq!(config.pipeline.taxonomy, Taxonomy::ChapterXml);
        assert_eq!(config.pipeline.republish_policy, RepublishPolicy::Reject);
        assert_eq!(config.schedule.start_delay_secs, 5);
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unknown_taxonomy() {
        clear_env();
        std::env::set_var("INGEST_TAXONOMY", "pdf-only");
        let result = IngestConfig::from_env();
        clear_env();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unparseable_port() {
        clear_env();
        std::env::set_var("INGEST_API_PORT", "eighty");
        let result = IngestConfig::from_env();
        clear_env();
        assert!(result.is_err());
    }
}
