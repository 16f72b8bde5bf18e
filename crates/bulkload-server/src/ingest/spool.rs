//! Upload spooling
//!
//! Uploaded files are copied to uniquely named temp files
//! (`ingestion-*.upload`) before the request returns, so the background task
//! reads from disk instead of from the request body. A [`SpooledFile`] owns its
//! temp file: [`SpooledFile::cleanup`] removes it and logs a failure, and
//! dropping it removes it silently.

use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::error::{IngestError, IngestResult};

const SPOOL_PREFIX: &str = "ingestion-";
const SPOOL_SUFFIX: &str = ".upload";

/// An upload copied to local disk
#[derive(Debug)]
pub struct SpooledFile {
    /// Name supplied by the client, or the temp file name when none was given
    pub filename: String,
    pub size: u64,
    path: TempPath,
}

impl SpooledFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Delete the temp file. Failures are logged, never returned.
    pub fn cleanup(self) {
        let filename = self.filename;
        let path = self.path.display().to_string();
        match self.path.close() {
            Ok(()) => debug!(filename = %filename, path = %path, "Removed spooled file"),
            Err(e) => warn!(
                filename = %filename,
                path = %path,
                error = %e,
                "Failed to remove spooled file"
            ),
        }
    }
}

/// Temp-file factory rooted at one directory
#[derive(Debug, Clone)]
pub struct Spool {
    dir: PathBuf,
}

impl Spool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Copy a stream of byte chunks to a new temp file.
    pub async fn spool_stream<S, B, E>(
        &self,
        filename: Option<&str>,
        mut chunks: S,
    ) -> IngestResult<SpooledFile>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let temp = tempfile::Builder::new()
            .prefix(SPOOL_PREFIX)
            .suffix(SPOOL_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(IngestError::Spool)?;
        let (file, path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let mut size: u64 = 0;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| IngestError::Spool(std::io::Error::other(e)))?;
            let bytes = chunk.as_ref();
            file.write_all(bytes).await.map_err(IngestError::Spool)?;
            size += bytes.len() as u64;
        }
        file.flush().await.map_err(IngestError::Spool)?;
        drop(file);

        let filename = match filename.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| SPOOL_SUFFIX.to_string()),
        };

        debug!(filename = %filename, size, path = %path.display(), "Spooled upload");

        Ok(SpooledFile {
            filename,
            size,
            path,
        })
    }

    /// Copy an in-memory buffer to a new temp file.
    pub async fn spool_bytes(
        &self,
        filename: Option<&str>,
        bytes: &[u8],
    ) -> IngestResult<SpooledFile> {
        let chunks = futures::stream::iter([Ok::<_, std::io::Error>(bytes)]);
        self.spool_stream(filename, chunks).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spool_bytes_writes_named_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::new(dir.path());

        let spooled = spool.spool_bytes(Some("accounts.csv"), b"h1,h2\n1,A\n").await.unwrap();

        assert_eq!(spooled.filename, "accounts.csv");
        assert_eq!(spooled.size, 10);
        let name = spooled.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("ingestion-"));
        assert!(name.ends_with(".upload"));
        assert_eq!(std::fs::read(spooled.path()).unwrap(), b"h1,h2\n1,A\n");
    }

    #[tokio::test]
    async fn test_blank_filename_falls_back_to_temp_name() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::new(dir.path());

        let spooled = spool.spool_bytes(Some("   "), b"x").await.unwrap();
        assert!(spooled.filename.starts_with("ingestion-"));

        let unnamed = spool.spool_bytes(None, b"x").await.unwrap();
        assert!(unnamed.filename.ends_with(".upload"));
    }

    #[tokio::test]
    async fn test_stream_chunks_are_concatenated() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::new(dir.path());
        let chunks = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(b"h1,h2\n".to_vec()),
            Ok(b"1,A\n".to_vec()),
        ]);

        let spooled = spool.spool_stream(Some("a.csv"), chunks).await.unwrap();
        assert_eq!(std::fs::read_to_string(spooled.path()).unwrap(), "h1,h2\n1,A\n");
    }

    #[tokio::test]
    async fn test_stream_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::new(dir.path());
        let chunks = futures::stream::iter(vec![
            Ok(b"h1,h2\n".to_vec()),
            Err(std::io::Error::other("connection reset")),
        ]);

        let result = spool.spool_stream(Some("a.csv"), chunks).await;
        assert!(matches!(result, Err(IngestError::Spool(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_and_drop_remove_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::new(dir.path());

        let first = spool.spool_bytes(Some("a.csv"), b"x").await.unwrap();
        let first_path = first.path().to_path_buf();
        first.cleanup();
        assert!(!first_path.exists());

        let second = spool.spool_bytes(Some("b.csv"), b"x").await.unwrap();
        let second_path = second.path().to_path_buf();
        drop(second);
        assert!(!second_path.exists());
    }

    #[tokio::test]
    async fn test_missing_spool_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::new(dir.path().join("does-not-exist"));

        let result = spool.spool_bytes(Some("a.csv"), b"x").await;
        assert!(matches!(result, Err(IngestError::Spool(_))));
    }
}
