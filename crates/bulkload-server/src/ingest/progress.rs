//! Job progress
//!
//! The row ingestor emits per-file [`JobTotals`] snapshots to a
//! [`ProgressListener`]. The orchestrator's listener adds the totals of files
//! already finished and hands the job-wide numbers to [`ProgressReporter`],
//! which derives the percentage and persists only real changes.

use async_trait::async_trait;
use bulkload_common::types::{IngestionJob, JobTotals};
use std::sync::Arc;

use crate::db::JobRepository;

use super::error::IngestResult;

/// Receives counter snapshots while a file is being ingested
#[async_trait]
pub trait ProgressListener: Send {
    async fn on_progress(&mut self, snapshot: JobTotals) -> IngestResult<()>;
}

/// Listener that drops every snapshot
pub struct NoopProgress;

#[async_trait]
impl ProgressListener for NoopProgress {
    async fn on_progress(&mut self, _snapshot: JobTotals) -> IngestResult<()> {
        Ok(())
    }
}

/// `min(100, round(processed * 100 / estimate))`, or `None` without a usable estimate.
pub fn percent_complete(processed: i64, estimate: i64) -> Option<i32> {
    if estimate <= 0 {
        return None;
    }
    let ratio = (processed.max(0) as f64) * 100.0 / (estimate as f64);
    Some(ratio.round().min(100.0) as i32)
}

/// Applies job-wide totals to a job and persists the result
#[derive(Clone)]
pub struct ProgressReporter {
    jobs: Arc<dyn JobRepository>,
}

impl ProgressReporter {
    pub fn new(jobs: Arc<dyn JobRepository>) -> Self {
        Self { jobs }
    }

    /// Raise the job's counters and percentage to match `totals`.
    ///
    /// Returns whether anything changed (and was therefore saved).
    pub async fn report(&self, job: &mut IngestionJob, totals: JobTotals) -> IngestResult<bool> {
        let before = (job.totals(), job.progress_percent);

        job.apply_totals(totals);
        if let Some(percent) = percent_complete(job.processed_records, job.total_records_estimate) {
            job.raise_progress(percent);
        }

        if (job.totals(), job.progress_percent) == before {
            return Ok(false);
        }

        self.jobs.save(job).await?;
        Ok(true)
    }
}

/// Listener that folds a file's snapshots into its job
pub struct JobProgressSink<'a> {
    reporter: &'a ProgressReporter,
    job: &'a mut IngestionJob,
    /// Totals of the files completed before this one
    base: JobTotals,
}

impl<'a> JobProgressSink<'a> {
    pub fn new(reporter: &'a ProgressReporter, job: &'a mut IngestionJob, base: JobTotals) -> Self {
        Self {
            reporter,
            job,
            base,
        }
    }
}

#[async_trait]
impl ProgressListener for JobProgressSink<'_> {
    async fn on_progress(&mut self, snapshot: JobTotals) -> IngestResult<()> {
        self.reporter
            .report(self.job, self.base.add(snapshot))
            .await
            .map(|_| ())
    }
}
