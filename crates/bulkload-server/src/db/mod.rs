//! Persistence capabilities
//!
//! The ingestion core talks to storage through two traits:
//!
//! - [`RecordStore`]: the shared `account_products` collection (bulk insert,
//!   whole-collection clears, ordered export stream)
//! - [`JobRepository`]: ingestion job records, including the atomic
//!   single-active-job claim
//!
//! [`postgres`] is the production backend. [`memory`] has identical semantics
//! and backs local development (`BULKLOAD_STORAGE=memory`) and the test-suite.

use async_trait::async_trait;
use bulkload_common::types::{AccountProduct, IngestionJob};
use futures::stream::BoxStream;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::DatabaseConfig;

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryJobRepository, InMemoryRecordStore};
pub use postgres::{PgJobRepository, PgRecordStore};

/// Database operation errors with contextual information
#[derive(Error, Debug)]
pub enum DbError {
    /// SQL query or connection error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Database configuration is invalid or missing
    #[error("Database configuration error: {0}. Check DATABASE_URL and connection settings.")]
    Config(String),

    /// Requested record does not exist
    #[error("{0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("{0}")]
    Duplicate(String),

    /// A persisted value could not be mapped back to a domain type
    #[error("Invalid stored data: {0}")]
    InvalidData(#[from] bulkload_common::BulkloadError),
}

impl DbError {
    /// Create a not found error with resource context
    pub fn not_found(resource_type: &str, identifier: &str) -> Self {
        Self::NotFound(format!("{} '{}' not found in database", resource_type, identifier))
    }

    /// Create a duplicate error with resource context
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::Duplicate(message.into())
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Per-operation failure reason reported by a bulk insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteErrorCode {
    /// The identifier already exists
    DuplicateKey,
    /// Any other store-specific failure code
    Other(String),
}

/// One failed operation inside a bulk insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteError {
    /// Position of the operation in the submitted batch
    pub index: usize,
    pub code: WriteErrorCode,
    pub message: String,
}

impl WriteError {
    pub fn duplicate_key(index: usize, id: &str) -> Self {
        Self {
            index,
            code: WriteErrorCode::DuplicateKey,
            message: format!("duplicate key: {}", id),
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        self.code == WriteErrorCode::DuplicateKey
    }
}

/// What the store reports back for an unordered bulk insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkWriteOutcome {
    /// Every operation was applied
    Acknowledged { inserted: i64 },
    /// Some operations failed; the rest were still attempted
    Partial {
        inserted: i64,
        errors: Vec<WriteError>,
    },
}

impl BulkWriteOutcome {
    /// Build an outcome from the store's inserted count and collected errors.
    pub fn from_parts(inserted: i64, errors: Vec<WriteError>) -> Self {
        if errors.is_empty() {
            Self::Acknowledged { inserted }
        } else {
            Self::Partial { inserted, errors }
        }
    }
}

/// The shared record collection
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Unordered, insert-only bulk write with per-operation error reporting.
    async fn bulk_insert(&self, records: &[AccountProduct]) -> DbResult<BulkWriteOutcome>;

    async fn count(&self) -> DbResult<i64>;

    /// Fast whole-collection clear. Returns the number of records removed.
    async fn truncate(&self) -> DbResult<i64>;

    /// Row-by-row delete of every record. Returns the number removed.
    async fn delete_all(&self) -> DbResult<i64>;

    /// Every record, ordered by id.
    fn stream_all(&self) -> BoxStream<'_, DbResult<AccountProduct>>;

    async fn health_check(&self) -> DbResult<()>;
}

/// Ingestion job records
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Point-in-time check for a PENDING or RUNNING job.
    async fn has_active(&self) -> DbResult<bool>;

    /// Persist a new PENDING job.
    ///
    /// This is the atomic admission claim: fails with [`DbError::Duplicate`]
    /// when another job is already PENDING or RUNNING.
    async fn insert_pending(&self, job: &IngestionJob) -> DbResult<()>;

    async fn find(&self, id: Uuid) -> DbResult<Option<IngestionJob>>;

    /// Every PENDING or RUNNING job, oldest first.
    async fn list_active(&self) -> DbResult<Vec<IngestionJob>>;

    /// Overwrite an existing job.
    ///
    /// Fails with [`DbError::NotFound`] if the job was removed, and with
    /// [`DbError::Duplicate`] if the write would make a second job active.
    async fn save(&self, job: &IngestionJob) -> DbResult<()>;

    /// Remove a job. Returns whether it existed.
    async fn delete(&self, id: Uuid) -> DbResult<bool>;
}

pub async fn create_pool(config: &DatabaseConfig) -> DbResult<PgPool> {
    if config.url.is_empty() {
        return Err(DbError::Config("DATABASE_URL not set".to_string()));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> DbResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(DbError::from)
}
