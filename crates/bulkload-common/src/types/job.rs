//! Ingestion job model
//!
//! A job moves `PENDING -> RUNNING -> {SUCCEEDED, FAILED}`. The only way back
//! to `PENDING` is [`IngestionJob::reset`]. Counters only grow while a job is
//! running, and `files` keeps one entry per submitted file in submission order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::BulkloadError;

/// `total_records_estimate` value meaning "could not be estimated".
pub const UNKNOWN_ESTIMATE: i64 = -1;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Pending and running jobs occupy the single admission slot.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = BulkloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCEEDED" => Ok(JobStatus::Succeeded),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(BulkloadError::unknown_variant("job status", other)),
        }
    }
}

/// Per-file state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Outcome of ingesting one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub filename: String,
    pub total_records: i64,
    pub inserted_records: i64,
    pub duplicate_records: i64,
    pub invalid_records: i64,
    pub duration_millis: i64,
}

impl FileResult {
    pub fn totals(&self) -> JobTotals {
        JobTotals {
            processed: self.total_records,
            inserted: self.inserted_records,
            duplicates: self.duplicate_records,
            invalid: self.invalid_records,
        }
    }
}

/// Status entry for one submitted file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFile {
    pub filename: String,
    pub status: FileStatus,
    pub total_records: i64,
    pub inserted_records: i64,
    pub duplicate_records: i64,
    pub invalid_records: i64,
    pub duration_millis: i64,
    pub error_message: Option<String>,
}

impl JobFile {
    pub fn pending(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Pending,
            total_records: 0,
            inserted_records: 0,
            duplicate_records: 0,
            invalid_records: 0,
            duration_millis: 0,
            error_message: None,
        }
    }

    pub fn completed(result: &FileResult) -> Self {
        Self {
            filename: result.filename.clone(),
            status: FileStatus::Succeeded,
            total_records: result.total_records,
            inserted_records: result.inserted_records,
            duplicate_records: result.duplicate_records,
            invalid_records: result.invalid_records,
            duration_millis: result.duration_millis,
            error_message: None,
        }
    }

    pub fn failed(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: FileStatus::Failed,
            error_message: Some(message.into()),
            ..Self::pending(filename)
        }
    }
}

/// Row counters shared by files and jobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTotals {
    pub processed: i64,
    pub inserted: i64,
    pub duplicates: i64,
    pub invalid: i64,
}

impl JobTotals {
    pub fn add(self, other: JobTotals) -> JobTotals {
        JobTotals {
            processed: self.processed.saturating_add(other.processed),
            inserted: self.inserted.saturating_add(other.inserted),
            duplicates: self.duplicates.saturating_add(other.duplicates),
            invalid: self.invalid.saturating_add(other.invalid),
        }
    }
}

/// Asynchronous ingestion job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionJob {
    #[serde(rename = "jobId")]
    pub id: Uuid,
    pub status: JobStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub delete_existing: bool,
    pub deleted_records: i64,
    pub total_records_estimate: i64,
    pub processed_records: i64,
    pub inserted_records: i64,
    pub duplicate_records: i64,
    pub invalid_records: i64,
    pub total_records: i64,
    pub progress_percent: i32,
    pub error_message: Option<String>,
    pub files: Vec<JobFile>,
}

impl IngestionJob {
    /// New pending job with one pending entry per file.
    pub fn new_pending<I, S>(filenames: I, delete_existing: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            created_at: Some(Utc::now()),
            started_at: None,
            completed_at: None,
            delete_existing,
            deleted_records: 0,
            total_records_estimate: 0,
            processed_records: 0,
            inserted_records: 0,
            duplicate_records: 0,
            invalid_records: 0,
            total_records: 0,
            progress_percent: 0,
            error_message: None,
            files: filenames.into_iter().map(JobFile::pending).collect(),
        }
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.error_message = None;
    }

    /// Current counters as totals.
    pub fn totals(&self) -> JobTotals {
        JobTotals {
            processed: self.processed_records,
            inserted: self.inserted_records,
            duplicates: self.duplicate_records,
            invalid: self.invalid_records,
        }
    }

    /// Raise counters to `totals`; values never move backwards.
    pub fn apply_totals(&mut self, totals: JobTotals) {
        self.processed_records = self.processed_records.max(totals.processed);
        self.inserted_records = self.inserted_records.max(totals.inserted);
        self.duplicate_records = self.duplicate_records.max(totals.duplicates);
        self.invalid_records = self.invalid_records.max(totals.invalid);
        self.total_records = self.processed_records;
    }

    /// Raise progress to `percent`, clamped to 0..=100.
    pub fn raise_progress(&mut self, percent: i32) {
        self.progress_percent = self.progress_percent.max(percent.clamp(0, 100));
    }

    pub fn mark_succeeded(&mut self, totals: JobTotals) {
        self.apply_totals(totals);
        self.status = JobStatus::Succeeded;
        self.completed_at = Some(Utc::now());
        self.progress_percent = 100;
        if self.total_records_estimate == UNKNOWN_ESTIMATE {
            self.total_records_estimate = self.total_records;
        }
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(message.into());
    }

    /// Back to `PENDING` with zeroed counters and no files.
    ///
    /// The pre-clear choice is discarded along with the file list.
    pub fn reset(&mut self) {
        self.status = JobStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.delete_existing = false;
        self.deleted_records = 0;
        self.total_records_estimate = 0;
        self.processed_records = 0;
        self.inserted_records = 0;
        self.duplicate_records = 0;
        self.invalid_records = 0;
        self.total_records = 0;
        self.progress_percent = 0;
        self.error_message = None;
        self.files.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn result(name: &str, processed: i64, inserted: i64) -> FileResult {
        FileResult {
            filename: name.to_string(),
            total_records: processed,
            inserted_records: inserted,
            duplicate_records: 0,
            invalid_records: processed - inserted,
            duration_millis: 5,
        }
    }

    #[test]
    fn test_new_pending_has_one_entry_per_file() {
        let job = IngestionJob::new_pending(["a.csv", "b.csv.gz"], true);

        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.delete_existing);
        assert!(job.created_at.is_some());
        assert!(job.started_at.is_none());
        assert_eq!(job.files.len(), 2);
        assert!(job.files.iter().all(|f| f.status == FileStatus::Pending));
        assert_eq!(job.files[1].filename, "b.csv.gz");
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Succeeded,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<JobStatus>().is_err());
        assert!(JobStatus::Running.is_active());
        assert!(!JobStatus::Failed.is_active());
    }

    #[test]
    fn test_counters_never_decrease() {
        let mut job = IngestionJob::new_pending(["a.csv"], false);
        job.apply_totals(JobTotals {
            processed: 10,
            inserted: 8,
            duplicates: 1,
            invalid: 1,
        });
        job.apply_totals(JobTotals {
            processed: 5,
            ..Default::default()
        });

        assert_eq!(job.processed_records, 10);
        assert_eq!(job.total_records, 10);
        assert_eq!(job.inserted_records, 8);

        job.raise_progress(40);
        job.raise_progress(20);
        assert_eq!(job.progress_percent, 40);
        job.raise_progress(250);
        assert_eq!(job.progress_percent, 100);
    }

    #[test]
    fn test_mark_succeeded_backfills_unknown_estimate() {
        let mut job = IngestionJob::new_pending(["a.csv"], false);
        job.mark_running();
        job.total_records_estimate = UNKNOWN_ESTIMATE;
        job.mark_succeeded(result("a.csv", 7, 7).totals());

        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.progress_percent, 100);
        assert_eq!(job.total_records_estimate, 7);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_mark_failed_keeps_counters() {
        let mut job = IngestionJob::new_pending(["a.csv"], false);
        job.mark_running();
        job.apply_totals(result("a.csv", 3, 3).totals());
        job.mark_failed("boom");

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("boom"));
        assert_eq!(job.processed_records, 3);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut job = IngestionJob::new_pending(["a.csv"], true);
        job.mark_running();
        job.apply_totals(result("a.csv", 3, 3).totals());
        job.raise_progress(50);
        job.reset();

        assert_eq!(job.status, JobStatus::Pending);
        assert!(!job.delete_existing);
        assert!(job.files.is_empty());
        assert_eq!(job.totals(), JobTotals::default());
        assert_eq!(job.progress_percent, 0);
        assert!(job.started_at.is_none());
        assert!(job.created_at.is_some());
    }

    #[test]
    fn test_job_file_constructors() {
        let done = JobFile::completed(&result("a.csv", 4, 3));
        assert_eq!(done.status, FileStatus::Succeeded);
        assert_eq!(done.invalid_records, 1);

        let failed = JobFile::failed("b.csv", "bad gzip");
        assert_eq!(failed.status, FileStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("bad gzip"));
        assert_eq!(failed.total_records, 0);
    }

    #[test]
    fn test_json_shape() {
        let job = IngestionJob::new_pending(["a.csv"], false);
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["status"], "PENDING");
        assert!(value.get("jobId").is_some());
        assert!(value.get("totalRecordsEstimate").is_some());
        assert_eq!(value["files"][0]["status"], "PENDING");
    }
}
