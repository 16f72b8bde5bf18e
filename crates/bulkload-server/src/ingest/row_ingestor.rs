//! Per-file streaming ingestion
//!
//! decode -> parse -> validate -> batch -> flush, one file at a time. Parsing
//! and flushing alternate on the same task, so at most one batch of records is
//! held in memory and a slow store naturally slows the reader down.

use bulkload_common::types::{AccountProduct, FileResult, JobTotals};
use csv_async::{AsyncReaderBuilder, ByteRecord, Trim};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncRead;
use tracing::{debug, info};

use crate::db::RecordStore;

use super::bulk_write::{classify, BulkWriteSummary};
use super::compression;
use super::error::{IngestError, IngestResult};
use super::progress::ProgressListener;

/// Running counters for one file plus the progress watermark
#[derive(Debug)]
struct FileAccumulator {
    processed: i64,
    inserted: i64,
    duplicates: i64,
    invalid: i64,
    interval: i64,
    next_report_at: i64,
}

impl FileAccumulator {
    fn new(interval: i64) -> Self {
        Self {
            processed: 0,
            inserted: 0,
            duplicates: 0,
            invalid: 0,
            interval,
            next_report_at: interval,
        }
    }

    fn snapshot(&self) -> JobTotals {
        JobTotals {
            processed: self.processed,
            inserted: self.inserted,
            duplicates: self.duplicates,
            invalid: self.invalid,
        }
    }

    fn record_flush(&mut self, summary: BulkWriteSummary) {
        self.inserted += summary.inserted;
        self.duplicates += summary.duplicates;
    }

    fn report_due(&self) -> bool {
        self.processed >= self.next_report_at
    }

    fn mark_reported(&mut self) {
        self.next_report_at = self.processed + self.interval;
    }
}

/// Streams one delimited file into a [`RecordStore`]
#[derive(Clone)]
pub struct RowIngestor {
    store: Arc<dyn RecordStore>,
    batch_size: usize,
    progress_interval: i64,
}

impl RowIngestor {
    pub fn new(store: Arc<dyn RecordStore>, batch_size: usize, progress_interval: i64) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            progress_interval: progress_interval.max(1),
        }
    }

    /// Ingest one file.
    ///
    /// The first row is a header and is skipped unchecked. Rows that fail
    /// validation are counted as invalid. A fatal bulk write or a read/parse
    /// failure aborts the file; records flushed before that stay stored.
    #[tracing::instrument(skip(self, reader, listener))]
    pub async fn ingest<R>(
        &self,
        filename: &str,
        reader: R,
        listener: &mut dyn ProgressListener,
    ) -> IngestResult<FileResult>
    where
        R: AsyncRead + Send + 'static,
    {
        let started = Instant::now();
        let mut rows = AsyncReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .create_reader(compression::decode(reader, filename));

        let mut acc = FileAccumulator::new(self.progress_interval);
        let mut batch: Vec<AccountProduct> = Vec::with_capacity(self.batch_size);
        let mut row = ByteRecord::new();
        let mut header_skipped = false;

        while rows
            .read_byte_record(&mut row)
            .await
            .map_err(|source| IngestError::Parse {
                filename: filename.to_string(),
                source,
            })?
        {
            if !header_skipped {
                header_skipped = true;
                continue;
            }

            acc.processed += 1;
            let fields: Vec<_> = row.iter().take(2).map(String::from_utf8_lossy).collect();
            match AccountProduct::from_row(fields.iter().map(|f| f.as_ref())) {
                Ok(record) => batch.push(record),
                Err(_) => acc.invalid += 1,
            }

            if batch.len() >= self.batch_size {
                self.flush(&mut batch, &mut acc).await?;
            }

            if acc.report_due() {
                listener.on_progress(acc.snapshot()).await?;
                acc.mark_reported();
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, &mut acc).await?;
        }
        listener.on_progress(acc.snapshot()).await?;

        let result = FileResult {
            filename: filename.to_string(),
            total_records: acc.processed,
            inserted_records: acc.inserted,
            duplicate_records: acc.duplicates,
            invalid_records: acc.invalid,
            duration_millis: started.elapsed().as_millis() as i64,
        };

        info!(
            processed = result.total_records,
            inserted = result.inserted_records,
            duplicates = result.duplicate_records,
            invalid = result.invalid_records,
            duration_ms = result.duration_millis,
            "File ingested"
        );

        Ok(result)
    }

    async fn flush(
        &self,
        batch: &mut Vec<AccountProduct>,
        acc: &mut FileAccumulator,
    ) -> IngestResult<()> {
        let summary = classify(self.store.bulk_insert(batch).await)?;
        debug!(
            batch = batch.len(),
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            "Flushed batch"
        );
        acc.record_flush(summary);
        batch.clear();
        Ok(())
    }
}

/// Best-effort data row count (lines minus the header), used as a progress
/// denominator. `None` when the file cannot be read or decoded.
pub async fn estimate_record_count(path: &Path, filename: &str) -> Option<i64> {
    let path: PathBuf = path.to_path_buf();
    let filename = filename.to_string();

    let counted = tokio::task::spawn_blocking(move || -> std::io::Result<i64> {
        let file = std::fs::File::open(&path)?;
        let mut lines = 0_i64;
        for line in compression::decode_blocking(file, &filename).split(b'\n') {
            line?;
            lines += 1;
        }
        Ok((lines - 1).max(0))
    })
    .await;

    match counted {
        Ok(Ok(count)) => Some(count),
        Ok(Err(e)) => {
            debug!(error = %e, "Could not estimate record count");
            None
        },
        Err(e) => {
            debug!(error = %e, "Record count estimate task failed");
            None
        },
    }
}
