//! PostgreSQL backend

use async_trait::async_trait;
use bulkload_common::types::{AccountProduct, IngestionJob, JobFile};
use chrono::{DateTime, Utc};
use futures::{stream::BoxStream, StreamExt};
use sqlx::{types::Json, PgPool};
use std::collections::HashSet;
use uuid::Uuid;

use super::{BulkWriteOutcome, DbError, DbResult, JobRepository, RecordStore, WriteError};

const ACTIVE_JOB_MESSAGE: &str = "Another ingestion job is already PENDING or RUNNING";

/// Map unique violations to [`DbError::Duplicate`], everything else to [`DbError::Sqlx`].
fn map_unique_violation(err: sqlx::Error, message: &str) -> DbError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return DbError::duplicate(message);
        }
    }
    DbError::Sqlx(err)
}

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: String,
    account_number: String,
    product_code: String,
}

impl From<RecordRow> for AccountProduct {
    fn from(row: RecordRow) -> Self {
        AccountProduct {
            id: row.id,
            account_number: row.account_number,
            product_code: row.product_code,
        }
    }
}

/// `account_products` table
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn bulk_insert(&self, records: &[AccountProduct]) -> DbResult<BulkWriteOutcome> {
        if records.is_empty() {
            return Ok(BulkWriteOutcome::Acknowledged { inserted: 0 });
        }

        let mut ids = Vec::with_capacity(records.len());
        let mut accounts = Vec::with_capacity(records.len());
        let mut products = Vec::with_capacity(records.len());
        for record in records {
            ids.push(record.id.clone());
            accounts.push(record.account_number.clone());
            products.push(record.product_code.clone());
        }

        // Conflicting rows are skipped and simply missing from RETURNING.
        let returned: Vec<String> = sqlx::query_scalar(
            r#"
            INSERT INTO account_products (id, account_number, product_code)
            SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[])
            ON CONFLICT (id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&ids)
        .bind(&accounts)
        .bind(&products)
        .fetch_all(&self.pool)
        .await?;

        let inserted = returned.len() as i64;
        let mut fresh: HashSet<String> = returned.into_iter().collect();

        // Each returned id accounts for exactly one operation, so a pair
        // repeated inside the batch is reported as a duplicate the second time.
        let errors = records
            .iter()
            .enumerate()
            .filter(|(_, record)| !fresh.remove(&record.id))
            .map(|(index, record)| WriteError::duplicate_key(index, &record.id))
            .collect();

        Ok(BulkWriteOutcome::from_parts(inserted, errors))
    }

    async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM account_products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn truncate(&self) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account_products")
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query("TRUNCATE TABLE account_products")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(count)
    }

    async fn delete_all(&self) -> DbResult<i64> {
        let result = sqlx::query("DELETE FROM account_products")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as i64)
    }

    fn stream_all(&self) -> BoxStream<'_, DbResult<AccountProduct>> {
        sqlx::query_as::<_, RecordRow>(
            "SELECT id, account_number, product_code FROM account_products ORDER BY id",
        )
        .fetch(&self.pool)
        .map(|row| row.map(AccountProduct::from).map_err(DbError::from))
        .boxed()
    }

    async fn health_check(&self) -> DbResult<()> {
        super::health_check(&self.pool).await
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    status: String,
    created_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    delete_existing: bool,
    deleted_records: i64,
    total_records_estimate: i64,
    processed_records: i64,
    inserted_records: i64,
    duplicate_records: i64,
    invalid_records: i64,
    total_records: i64,
    progress_percent: i32,
    error_message: Option<String>,
    files: Json<Vec<JobFile>>,
}

impl TryFrom<JobRow> for IngestionJob {
    type Error = DbError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(IngestionJob {
            id: row.id,
            status: row.status.parse()?,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            delete_existing: row.delete_existing,
            deleted_records: row.deleted_records,
            total_records_estimate: row.total_records_estimate,
            processed_records: row.processed_records,
            inserted_records: row.inserted_records,
            duplicate_records: row.duplicate_records,
            invalid_records: row.invalid_records,
            total_records: row.total_records,
            progress_percent: row.progress_percent,
            error_message: row.error_message,
            files: row.files.0,
        })
    }
}

/// `ingestion_jobs` table
///
/// The partial unique index `ingestion_jobs_single_active` enforces the
/// single-active-job rule for both inserts and updates.
#[derive(Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn has_active(&self) -> DbResult<bool> {
        let active = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM ingestion_jobs WHERE status IN ('PENDING', 'RUNNING'))",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(active)
    }

    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    async fn insert_pending(&self, job: &IngestionJob) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ingestion_jobs (
                id, status, created_at, started_at, completed_at, delete_existing,
                deleted_records, total_records_estimate, processed_records,
                inserted_records, duplicate_records, invalid_records, total_records,
                progress_percent, error_message, files
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.delete_existing)
        .bind(job.deleted_records)
        .bind(job.total_records_estimate)
        .bind(job.processed_records)
        .bind(job.inserted_records)
        .bind(job.duplicate_records)
        .bind(job.invalid_records)
        .bind(job.total_records)
        .bind(job.progress_percent)
        .bind(&job.error_message)
        .bind(Json(&job.files))
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, ACTIVE_JOB_MESSAGE))?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> DbResult<Option<IngestionJob>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, status, created_at, started_at, completed_at, delete_existing,
                   deleted_records, total_records_estimate, processed_records,
                   inserted_records, duplicate_records, invalid_records, total_records,
                   progress_percent, error_message, files
            FROM ingestion_jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(IngestionJob::try_from).transpose()
    }

    async fn list_active(&self) -> DbResult<Vec<IngestionJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, status, created_at, started_at, completed_at, delete_existing,
                   deleted_records, total_records_estimate, processed_records,
                   inserted_records, duplicate_records, invalid_records, total_records,
                   progress_percent, error_message, files
            FROM ingestion_jobs
            WHERE status IN ('PENDING', 'RUNNING')
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(IngestionJob::try_from).collect()
    }

    async fn save(&self, job: &IngestionJob) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE ingestion_jobs SET
                status = $2,
                started_at = $3,
                completed_at = $4,
                delete_existing = $5,
                deleted_records = $6,
                total_records_estimate = $7,
                processed_records = $8,
                inserted_records = $9,
                duplicate_records = $10,
                invalid_records = $11,
                total_records = $12,
                progress_percent = $13,
                error_message = $14,
                files = $15
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.delete_existing)
        .bind(job.deleted_records)
        .bind(job.total_records_estimate)
        .bind(job.processed_records)
        .bind(job.inserted_records)
        .bind(job.duplicate_records)
        .bind(job.invalid_records)
        .bind(job.total_records)
        .bind(job.progress_percent)
        .bind(&job.error_message)
        .bind(Json(&job.files))
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, ACTIVE_JOB_MESSAGE))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Ingestion job", &job.id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM ingestion_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
