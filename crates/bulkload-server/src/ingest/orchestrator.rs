//! Ingestion job orchestration
//!
//! Owns the job lifecycle `PENDING -> RUNNING -> {SUCCEEDED, FAILED}`:
//! admission (one active job at a time), background execution on a
//! [`TaskTracker`], strictly sequential per-file ingestion, cross-file totals
//! and cleanup of spooled uploads.
//!
//! Admission is checked twice. [`JobOrchestrator::ensure_admissible`] and the
//! first step of [`JobOrchestrator::enqueue`] are advisory reads; the
//! authoritative check is the repository's atomic `insert_pending` claim.

use bulkload_common::types::{IngestionJob, JobFile, JobStatus, JobTotals, UNKNOWN_ESTIMATE};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::task::TaskTracker;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::db::{DbError, JobRepository, RecordStore};

use super::config::IngestConfig;
use super::error::{IngestError, IngestResult};
use super::progress::{JobProgressSink, ProgressReporter};
use super::row_ingestor::{estimate_record_count, RowIngestor};
use super::spool::{Spool, SpooledFile};

/// Error message recorded on jobs found active at startup.
pub const INTERRUPTED_MESSAGE: &str = "Interrupted by a server restart";

/// Why a background run stopped, and on which file
struct JobFailure {
    file_index: Option<usize>,
    error: IngestError,
}

impl JobFailure {
    fn at(file_index: usize) -> impl FnOnce(IngestError) -> JobFailure {
        move |error| JobFailure {
            file_index: Some(file_index),
            error,
        }
    }
}

impl From<IngestError> for JobFailure {
    fn from(error: IngestError) -> Self {
        Self {
            file_index: None,
            error,
        }
    }
}

impl From<DbError> for JobFailure {
    fn from(error: DbError) -> Self {
        IngestError::from(error).into()
    }
}

/// Entry point for submitting, inspecting and managing ingestion jobs
#[derive(Clone)]
pub struct JobOrchestrator {
    jobs: Arc<dyn JobRepository>,
    store: Arc<dyn RecordStore>,
    ingestor: RowIngestor,
    reporter: ProgressReporter,
    spool: Spool,
    tracker: TaskTracker,
}

impl JobOrchestrator {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        store: Arc<dyn RecordStore>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            ingestor: RowIngestor::new(store.clone(), config.batch_size, config.progress_interval),
            reporter: ProgressReporter::new(jobs.clone()),
            spool: Spool::new(config.spool_dir.clone()),
            tracker: TaskTracker::new(),
            jobs,
            store,
        }
    }

    /// Where uploads for new jobs are spooled
    pub fn spool(&self) -> &Spool {
        &self.spool
    }

    /// Advisory check that a new job would currently be admitted.
    pub async fn ensure_admissible(&self) -> IngestResult<()> {
        if self.jobs.has_active().await? {
            return Err(IngestError::JobInProgress);
        }
        Ok(())
    }

    /// Create a PENDING job for the spooled files and start it in the background.
    ///
    /// Empty files are dropped first. The returned snapshot is the job as
    /// persisted; the caller never waits for ingestion.
    pub async fn enqueue(
        &self,
        files: Vec<SpooledFile>,
        delete_existing: bool,
    ) -> IngestResult<IngestionJob> {
        let (accepted, empty): (Vec<_>, Vec<_>) = files.into_iter().partition(|f| !f.is_empty());
        for file in empty {
            warn!(filename = %file.filename, "Skipping empty upload");
            file.cleanup();
        }

        if accepted.is_empty() {
            return Err(IngestError::NoFiles);
        }

        if let Err(e) = self.ensure_admissible().await {
            discard(accepted);
            return Err(e);
        }

        let job = IngestionJob::new_pending(
            accepted.iter().map(|f| f.filename.clone()),
            delete_existing,
        );

        match self.jobs.insert_pending(&job).await {
            Ok(()) => {},
            Err(DbError::Duplicate(_)) => {
                discard(accepted);
                return Err(IngestError::JobInProgress);
            },
            Err(e) => {
                discard(accepted);
                return Err(e.into());
            },
        }

        info!(
            job_id = %job.id,
            files = accepted.len(),
            delete_existing,
            "Accepted ingestion job"
        );

        let this = self.clone();
        let background = job.clone();
        let span = info_span!("ingestion_job", job_id = %job.id);
        self.tracker
            .spawn(async move { this.execute_job(background, accepted).await }.instrument(span));

        Ok(job)
    }

    pub async fn find_job(&self, id: Uuid) -> IngestResult<IngestionJob> {
        self.jobs.find(id).await?.ok_or(IngestError::NotFound(id))
    }

    /// Reinitialize a job to PENDING with zeroed counters and no files.
    ///
    /// Allowed in any state. A background task still running this job is not
    /// signalled and may overwrite the reset with its own later writes.
    pub async fn reset_job(&self, id: Uuid) -> IngestResult<IngestionJob> {
        let mut job = self.find_job(id).await?;
        let previous = job.status;
        job.reset();

        match self.jobs.save(&job).await {
            Ok(()) => {},
            Err(DbError::Duplicate(_)) => return Err(IngestError::JobInProgress),
            Err(DbError::NotFound(_)) => return Err(IngestError::NotFound(id)),
            Err(e) => return Err(e.into()),
        }

        if previous == JobStatus::Running {
            warn!(job_id = %id, "Reset a RUNNING job; its background task is still active");
        } else {
            info!(job_id = %id, previous = %previous, "Reset ingestion job");
        }
        Ok(job)
    }

    /// Remove a job record. Rejected while the job is RUNNING.
    pub async fn delete_job(&self, id: Uuid) -> IngestResult<()> {
        let job = self.find_job(id).await?;
        if job.status == JobStatus::Running {
            return Err(IngestError::JobRunning(id));
        }
        if !self.jobs.delete(id).await? {
            return Err(IngestError::NotFound(id));
        }
        info!(job_id = %id, status = %job.status, "Deleted ingestion job");
        Ok(())
    }

    /// Fail every job left PENDING or RUNNING by a previous process.
    ///
    /// Must run before the first submission: no task of this process owns
    /// those jobs, and an active one would hold the admission slot forever.
    pub async fn fail_interrupted(&self) -> IngestResult<usize> {
        let stale = self.jobs.list_active().await?;
        let count = stale.len();
        for mut job in stale {
            let previous = job.status;
            job.mark_failed(INTERRUPTED_MESSAGE);
            self.jobs.save(&job).await?;
            warn!(job_id = %job.id, previous = %previous, "Marked interrupted ingestion job as failed");
        }
        Ok(count)
    }

    /// Wait until every background job has finished.
    pub async fn wait_for_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Wait for background jobs, giving up after `timeout`. Returns whether all finished.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let in_flight = self.tracker.len();
        if in_flight > 0 {
            info!(in_flight, "Waiting for ingestion jobs to finish");
        }
        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }

    async fn execute_job(&self, mut job: IngestionJob, files: Vec<SpooledFile>) {
        let started = Instant::now();

        match self.run_job(&mut job, &files).await {
            Ok(totals) => {
                job.mark_succeeded(totals);
                if let Err(e) = self.jobs.save(&job).await {
                    error!(error = %e, "Failed to record job success");
                }
                info!(
                    processed = job.processed_records,
                    inserted = job.inserted_records,
                    duplicates = job.duplicate_records,
                    invalid = job.invalid_records,
                    deleted = job.deleted_records,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Ingestion job succeeded"
                );
            },
            Err(failure) => {
                let message = failure.error.to_string();
                if let Some(entry) = failure.file_index.and_then(|i| job.files.get_mut(i)) {
                    *entry = JobFile::failed(entry.filename.clone(), message.clone());
                }
                job.mark_failed(message);
                if let Err(e) = self.jobs.save(&job).await {
                    error!(error = %e, "Failed to record job failure");
                }
                error!(
                    error = %failure.error,
                    processed = job.processed_records,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Ingestion job failed"
                );
            },
        }

        discard(files);
    }

    async fn run_job(
        &self,
        job: &mut IngestionJob,
        files: &[SpooledFile],
    ) -> Result<JobTotals, JobFailure> {
        job.mark_running();
        job.total_records_estimate = estimate_total(files).await;
        self.jobs.save(job).await?;
        info!(
            files = files.len(),
            estimate = job.total_records_estimate,
            "Ingestion job running"
        );

        if job.delete_existing {
            job.deleted_records = self.clear_existing().await?;
            self.jobs.save(job).await?;
        }

        let mut completed = JobTotals::default();
        for (index, file) in files.iter().enumerate() {
            let reader = tokio::fs::File::open(file.path())
                .await
                .map_err(|source| IngestError::Read {
                    filename: file.filename.clone(),
                    source,
                })
                .map_err(JobFailure::at(index))?;

            let result = {
                let mut sink = JobProgressSink::new(&self.reporter, job, completed);
                self.ingestor
                    .ingest(&file.filename, reader, &mut sink)
                    .await
                    .map_err(JobFailure::at(index))?
            };

            completed = completed.add(result.totals());
            if let Some(entry) = job.files.get_mut(index) {
                *entry = JobFile::completed(&result);
            }
            if !self.reporter.report(job, completed).await? {
                self.jobs.save(job).await?;
            }
        }

        Ok(completed)
    }

    /// Remove every stored record before loading. Truncate first, row delete if that fails.
    async fn clear_existing(&self) -> IngestResult<i64> {
        let started = Instant::now();

        match self.store.truncate().await {
            Ok(deleted) => {
                info!(
                    strategy = "truncate",
                    deleted,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Cleared existing records"
                );
                Ok(deleted)
            },
            Err(e) => {
                warn!(error = %e, "Truncate failed, falling back to delete-all");
                let deleted = self.store.delete_all().await?;
                info!(
                    strategy = "delete_all",
                    deleted,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Cleared existing records"
                );
                Ok(deleted)
            },
        }
    }
}

/// Sum of per-file estimates, or [`UNKNOWN_ESTIMATE`] when none could be computed.
async fn estimate_total(files: &[SpooledFile]) -> i64 {
    let mut total: Option<i64> = None;
    for file in files {
        if let Some(count) = estimate_record_count(file.path(), &file.filename).await {
            total = Some(total.unwrap_or(0).saturating_add(count));
        }
    }
    total.unwrap_or(UNKNOWN_ESTIMATE)
}

fn discard(files: Vec<SpooledFile>) {
    for file in files {
        file.cleanup();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::db::{
        BulkWriteOutcome, DbResult, InMemoryJobRepository, InMemoryRecordStore, WriteError,
        WriteErrorCode,
    };
    use async_trait::async_trait;
    use bulkload_common::types::{AccountProduct, FileStatus};
    use flate2::{write::GzEncoder, Compression};
    use futures::stream::BoxStream;
    use std::io::Write;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;
    use tokio::sync::Semaphore;

    /// In-memory store with switchable failure modes
    #[derive(Default)]
    struct ScriptedStore {
        inner: InMemoryRecordStore,
        /// Every bulk write waits for a permit when set
        gate: Option<Arc<Semaphore>>,
        /// Batches containing this product code fail with a non-duplicate error
        fail_product: Option<String>,
        truncate_fails: bool,
    }

    #[async_trait]
    impl RecordStore for ScriptedStore {
        async fn bulk_insert(&self, records: &[AccountProduct]) -> DbResult<BulkWriteOutcome> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if let Some(product) = &self.fail_product {
                if let Some(index) = records.iter().position(|r| &r.product_code == product) {
                    return Ok(BulkWriteOutcome::Partial {
                        inserted: 0,
                        errors: vec![WriteError {
                            index,
                            code: WriteErrorCode::Other("XX000".to_string()),
                            message: "storage engine failure".to_string(),
                        }],
                    });
                }
            }
            self.inner.bulk_insert(records).await
        }

        async fn count(&self) -> DbResult<i64> {
            self.inner.count().await
        }

        async fn truncate(&self) -> DbResult<i64> {
            if self.truncate_fails {
                return Err(DbError::Sqlx(sqlx::Error::PoolTimedOut));
            }
            self.inner.truncate().await
        }

        async fn delete_all(&self) -> DbResult<i64> {
            self.inner.delete_all().await
        }

        fn stream_all(&self) -> BoxStream<'_, DbResult<AccountProduct>> {
            self.inner.stream_all()
        }

        async fn health_check(&self) -> DbResult<()> {
            Ok(())
        }
    }

    /// Job repository that remembers every saved snapshot
    #[derive(Default)]
    struct RecordingJobs {
        inner: InMemoryJobRepository,
        saved: StdMutex<Vec<IngestionJob>>,
    }

    #[async_trait]
    impl JobRepository for RecordingJobs {
        async fn has_active(&self) -> DbResult<bool> {
            self.inner.has_active().await
        }

        async fn insert_pending(&self, job: &IngestionJob) -> DbResult<()> {
            self.inner.insert_pending(job).await
        }

        async fn find(&self, id: Uuid) -> DbResult<Option<IngestionJob>> {
            self.inner.find(id).await
        }

        async fn list_active(&self) -> DbResult<Vec<IngestionJob>> {
            self.inner.list_active().await
        }

        async fn save(&self, job: &IngestionJob) -> DbResult<()> {
            self.inner.save(job).await?;
            self.saved.lock().unwrap().push(job.clone());
            Ok(())
        }

        async fn delete(&self, id: Uuid) -> DbResult<bool> {
            self.inner.delete(id).await
        }
    }

    struct Harness {
        orchestrator: JobOrchestrator,
        store: Arc<ScriptedStore>,
        jobs: Arc<RecordingJobs>,
        spool_dir: TempDir,
    }

    impl Harness {
        fn new(store: ScriptedStore) -> Self {
            Self::with_config(store, 100, 10_000)
        }

        fn with_config(store: ScriptedStore, batch_size: usize, progress_interval: i64) -> Self {
            let spool_dir = tempfile::tempdir().unwrap();
            let store = Arc::new(store);
            let jobs = Arc::new(RecordingJobs::default());
            let config = IngestConfig {
                batch_size,
                progress_interval,
                spool_dir: spool_dir.path().to_path_buf(),
                ..Default::default()
            };
            let orchestrator = JobOrchestrator::new(jobs.clone(), store.clone(), &config);
            Self {
                orchestrator,
                store,
                jobs,
                spool_dir,
            }
        }

        async fn spooled(&self, name: &str, data: &[u8]) -> SpooledFile {
            self.orchestrator
                .spool()
                .spool_bytes(Some(name), data)
                .await
                .unwrap()
        }

        async fn submit(&self, files: &[(&str, &[u8])], delete_existing: bool) -> IngestionJob {
            let mut spooled = Vec::new();
            for (name, data) in files {
                spooled.push(self.spooled(name, data).await);
            }
            self.orchestrator.enqueue(spooled, delete_existing).await.unwrap()
        }

        async fn run(&self, files: &[(&str, &[u8])], delete_existing: bool) -> IngestionJob {
            let job = self.submit(files, delete_existing).await;
            self.orchestrator.wait_for_idle().await;
            self.orchestrator.find_job(job.id).await.unwrap()
        }

        fn spool_is_empty(&self) -> bool {
            std::fs::read_dir(self.spool_dir.path()).unwrap().count() == 0
        }
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn csv_with_rows(start: usize, rows: usize) -> Vec<u8> {
        let mut data = String::from("accountNumber,productCode\n");
        for i in start..start + rows {
            data.push_str(&format!("{},P{}\n", 10_000 + i, i % 10));
        }
        data.into_bytes()
    }

    #[tokio::test]
    async fn test_single_row_job_succeeds() {
        let h = Harness::new(ScriptedStore::default());

        let job = h
            .run(&[("a.csv", b"accountNumber,productCode\n12345678901234,ABC\n")], false)
            .await;

        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.inserted_records, 1);
        assert_eq!(job.duplicate_records, 0);
        assert_eq!(job.invalid_records, 0);
        assert_eq!(job.total_records, 1);
        assert_eq!(job.total_records_estimate, 1);
        assert_eq!(job.progress_percent, 100);
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_some());
        assert!(job.error_message.is_none());
        assert_eq!(job.files[0].status, FileStatus::Succeeded);
        assert_eq!(job.files[0].inserted_records, 1);
        assert!(h.spool_is_empty());
    }

    #[tokio::test]
    async fn test_same_row_twice_counts_a_duplicate() {
        let h = Harness::new(ScriptedStore::default());

        let job = h
            .run(&[("a.csv", b"h1,h2\n12345678901234,ABC\n12345678901234,ABC\n")], false)
            .await;

        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.inserted_records, 1);
        assert_eq!(job.duplicate_records, 1);
    }

    #[tokio::test]
    async fn test_empty_account_is_invalid_but_job_succeeds() {
        let h = Harness::new(ScriptedStore::default());

        let job = h.run(&[("a.csv", b"h1,h2\n,ABC\n")], false).await;

        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.invalid_records, 1);
        assert_eq!(job.inserted_records, 0);
    }

    #[tokio::test]
    async fn test_gzip_file_matches_plain_file() {
        let data = csv_with_rows(0, 25);
        let plain = Harness::new(ScriptedStore::default()).run(&[("a.csv", &data)], false).await;
        let gz = Harness::new(ScriptedStore::default())
            .run(&[("a.csv.GZ", &gzip(&data))], false)
            .await;

        assert_eq!(gz.status, JobStatus::Succeeded);
        assert_eq!(plain.totals(), gz.totals());
        assert_eq!(gz.total_records_estimate, 25);
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let h = Harness::new(ScriptedStore::default());
        let data = csv_with_rows(0, 40);

        let first = h.run(&[("a.csv", &data)], false).await;
        let second = h.run(&[("a.csv", &data)], false).await;

        assert_eq!(first.inserted_records, 40);
        assert_eq!(second.status, JobStatus::Succeeded);
        assert_eq!(second.inserted_records, 0);
        assert_eq!(second.duplicate_records, 40);
        assert_eq!(h.store.count().await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_files_run_in_order_with_cross_file_totals() {
        let h = Harness::with_config(ScriptedStore::default(), 7, 5);

        let job = h
            .run(
                &[
                    ("first.csv", &csv_with_rows(0, 30)),
                    ("second.csv", &csv_with_rows(30, 20)),
                ],
                false,
            )
            .await;

        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.processed_records, 50);
        assert_eq!(job.inserted_records, 50);
        assert_eq!(job.total_records_estimate, 50);
        let names: Vec<_> = job.files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["first.csv", "second.csv"]);
        assert_eq!(job.files[0].total_records, 30);
        assert_eq!(job.files[1].total_records, 20);

        let saved = h.jobs.saved.lock().unwrap().clone();
        assert!(saved.windows(2).all(|w| {
            w[0].progress_percent <= w[1].progress_percent
                && w[0].processed_records <= w[1].processed_records
                && w[0].inserted_records <= w[1].inserted_records
        }));
        // progress kept climbing through the second file instead of restarting
        assert!(saved.iter().any(|j| j.processed_records > 30 && j.processed_records < 50));
    }

    #[tokio::test]
    async fn test_second_submission_is_rejected_while_active() {
        let gate = Arc::new(Semaphore::new(0));
        let h = Harness::new(ScriptedStore {
            gate: Some(gate.clone()),
            ..Default::default()
        });

        let first = h.submit(&[("a.csv", &csv_with_rows(0, 3))], false).await;

        let second = h.spooled("b.csv", &csv_with_rows(3, 3)).await;
        let result = h.orchestrator.enqueue(vec![second], false).await;
        assert!(matches!(result, Err(IngestError::JobInProgress)));
        assert!(matches!(
            h.orchestrator.ensure_admissible().await,
            Err(IngestError::JobInProgress)
        ));

        gate.add_permits(10);
        h.orchestrator.wait_for_idle().await;

        let job = h.orchestrator.find_job(first.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(h.store.count().await.unwrap(), 3);
        assert!(h.spool_is_empty());
        h.orchestrator.ensure_admissible().await.unwrap();
    }

    #[tokio::test]
    async fn test_fatal_write_fails_in_flight_file_only() {
        let h = Harness::new(ScriptedStore {
            fail_product: Some("BAD".to_string()),
            ..Default::default()
        });

        let job = h
            .run(
                &[
                    ("good.csv", b"h1,h2\n1,A\n2,B\n"),
                    ("bad.csv", b"h1,h2\n3,C\n4,BAD\n"),
                ],
                false,
            )
            .await;

        assert_eq!(job.status, JobStatus::Failed);
        let message = job.error_message.clone().unwrap();
        assert!(message.contains("Bulk write failed with non-duplicate errors"));
        assert_eq!(job.files[0].status, FileStatus::Succeeded);
        assert_eq!(job.files[0].inserted_records, 2);
        assert_eq!(job.files[1].status, FileStatus::Failed);
        assert_eq!(job.files[1].error_message.as_deref(), Some(message.as_str()));
        assert!(job.completed_at.is_some());
        // records from the finished file are kept
        assert_eq!(h.store.count().await.unwrap(), 2);
        assert!(h.spool_is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_gzip_fails_job() {
        let h = Harness::new(ScriptedStore::default());

        let job = h.run(&[("a.csv.gz", b"h1,h2\n1,A\n")], false).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.total_records_estimate, UNKNOWN_ESTIMATE);
        assert_eq!(job.files[0].status, FileStatus::Failed);
        assert!(h.spool_is_empty());
    }

    #[tokio::test]
    async fn test_delete_existing_truncates_first() {
        let h = Harness::new(ScriptedStore::default());
        h.run(&[("old.csv", &csv_with_rows(100, 3))], false).await;

        let job = h.run(&[("new.csv", &csv_with_rows(0, 2))], true).await;

        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job.delete_existing);
        assert_eq!(job.deleted_records, 3);
        assert_eq!(job.inserted_records, 2);
        assert_eq!(h.store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_existing_falls_back_to_delete_all() {
        let h = Harness::new(ScriptedStore {
            truncate_fails: true,
            ..Default::default()
        });
        h.run(&[("old.csv", &csv_with_rows(100, 4))], false).await;

        let job = h.run(&[("new.csv", &csv_with_rows(100, 4))], true).await;

        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.deleted_records, 4);
        assert_eq!(job.inserted_records, 4);
        assert_eq!(job.duplicate_records, 0);
    }

    #[tokio::test]
    async fn test_empty_uploads_are_dropped() {
        let h = Harness::new(ScriptedStore::default());

        let empty = h.spooled("empty.csv", b"").await;
        assert!(matches!(
            h.orchestrator.enqueue(vec![empty], false).await,
            Err(IngestError::NoFiles)
        ));
        assert!(matches!(
            h.orchestrator.enqueue(Vec::new(), false).await,
            Err(IngestError::NoFiles)
        ));

        let job = h
            .run(&[("empty.csv", b""), ("a.csv", b"h1,h2\n1,A\n")], false)
            .await;
        assert_eq!(job.files.len(), 1);
        assert_eq!(job.files[0].filename, "a.csv");
        assert!(h.spool_is_empty());
    }

    #[tokio::test]
    async fn test_reset_job() {
        let h = Harness::new(ScriptedStore::default());
        let done = h.run(&[("a.csv", b"h1,h2\n1,A\n")], true).await;

        let reset = h.orchestrator.reset_job(done.id).await.unwrap();

        assert_eq!(reset.status, JobStatus::Pending);
        assert!(reset.files.is_empty());
        assert!(!reset.delete_existing);
        assert_eq!(reset.totals(), JobTotals::default());
        assert_eq!(reset.progress_percent, 0);
        assert_eq!(h.orchestrator.find_job(done.id).await.unwrap(), reset);

        assert!(matches!(
            h.orchestrator.reset_job(Uuid::new_v4()).await,
            Err(IngestError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_cannot_create_a_second_active_job() {
        // one permit for the first job's only batch
        let gate = Arc::new(Semaphore::new(1));
        let h = Harness::new(ScriptedStore {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let first = h.run(&[("a.csv", b"h1,h2\n1,A\n")], false).await;
        let second = h.submit(&[("b.csv", b"h1,h2\n2,B\n")], false).await;

        assert!(matches!(
            h.orchestrator.reset_job(first.id).await,
            Err(IngestError::JobInProgress)
        ));

        gate.add_permits(1);
        h.orchestrator.wait_for_idle().await;

        let first = h.orchestrator.find_job(first.id).await.unwrap();
        assert_eq!(first.status, JobStatus::Succeeded);
        let second = h.orchestrator.find_job(second.id).await.unwrap();
        assert_eq!(second.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_delete_job() {
        let gate = Arc::new(Semaphore::new(0));
        let h = Harness::new(ScriptedStore {
            gate: Some(gate.clone()),
            ..Default::default()
        });

        let job = h.submit(&[("a.csv", b"h1,h2\n1,A\n")], false).await;
        // let the background task reach the gated write
        while h.orchestrator.find_job(job.id).await.unwrap().status != JobStatus::Running {
            tokio::task::yield_now().await;
        }
        assert!(matches!(
            h.orchestrator.delete_job(job.id).await,
            Err(IngestError::JobRunning(_))
        ));

        gate.add_permits(1);
        h.orchestrator.wait_for_idle().await;

        h.orchestrator.delete_job(job.id).await.unwrap();
        assert!(matches!(
            h.orchestrator.find_job(job.id).await,
            Err(IngestError::NotFound(_))
        ));
        assert!(matches!(
            h.orchestrator.delete_job(job.id).await,
            Err(IngestError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_jobs() {
        let h = Harness::new(ScriptedStore::default());
        h.submit(&[("a.csv", b"h1,h2\n1,A\n")], false).await;

        assert!(h.orchestrator.shutdown(Duration::from_secs(5)).await);
        assert_eq!(h.store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fail_interrupted_frees_the_admission_slot() {
        let h = Harness::new(ScriptedStore::default());
        let finished = h.run(&[("a.csv", b"h1,h2\n1,A\n")], false).await;

        let mut orphan = IngestionJob::new_pending(["b.csv"], false);
        h.jobs.insert_pending(&orphan).await.unwrap();
        orphan.mark_running();
        h.jobs.save(&orphan).await.unwrap();
        assert!(matches!(
            h.orchestrator.ensure_admissible().await,
            Err(IngestError::JobInProgress)
        ));

        assert_eq!(h.orchestrator.fail_interrupted().await.unwrap(), 1);

        let orphan = h.orchestrator.find_job(orphan.id).await.unwrap();
        assert_eq!(orphan.status, JobStatus::Failed);
        assert_eq!(orphan.error_message.as_deref(), Some(INTERRUPTED_MESSAGE));
        assert!(orphan.completed_at.is_some());

        let finished_after = h.orchestrator.find_job(finished.id).await.unwrap();
        assert_eq!(finished_after.status, JobStatus::Succeeded);

        h.orchestrator.ensure_admissible().await.unwrap();
        assert_eq!(h.orchestrator.fail_interrupted().await.unwrap(), 0);
    }
}
