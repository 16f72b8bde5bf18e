//! Ingestion configuration
//!
//! Tuning for the row ingestor and upload spooling (`INGEST_*` variables).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of records per bulk write.
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

/// Default number of processed rows between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: i64 = 10_000;

/// Default request body limit for uploads (2 GiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024 * 1024;

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records buffered before a bulk write, at least 1
    pub batch_size: usize,
    /// Rows processed between progress reports, at least 1
    pub progress_interval: i64,
    /// Where uploads are spooled before the background task reads them
    pub spool_dir: PathBuf,
    /// Maximum accepted request body size
    pub max_upload_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            spool_dir: std::env::temp_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl IngestConfig {
    /// Load ingestion configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            batch_size: std::env::var("INGEST_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.batch_size)
                .max(1),
            progress_interval: std::env::var("INGEST_PROGRESS_INTERVAL")
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(defaults.progress_interval)
                .max(1),
            spool_dir: std::env::var("INGEST_SPOOL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.spool_dir),
            max_upload_bytes: std::env::var("INGEST_MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("INGEST_BATCH_SIZE must be greater than 0");
        }
        if self.progress_interval <= 0 {
            anyhow::bail!("INGEST_PROGRESS_INTERVAL must be greater than 0");
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("INGEST_MAX_UPLOAD_BYTES must be greater than 0");
        }
        if self.spool_dir.as_os_str().is_empty() {
            anyhow::bail!("INGEST_SPOOL_DIR cannot be empty");
        }
        Ok(())
    }
}
