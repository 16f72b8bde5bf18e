//! Ingestion error types

use thiserror::Error;
use uuid::Uuid;

use crate::db::{DbError, WriteError};

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("At least one file is required for ingestion")]
    NoFiles,

    #[error("An ingestion job is already running. Please wait for it to finish.")]
    JobInProgress,

    #[error("Cannot delete a job while it is running")]
    JobRunning(Uuid),

    #[error("Ingestion job '{0}' not found")]
    NotFound(Uuid),

    #[error("Failed to spool upload: {0}")]
    Spool(#[source] std::io::Error),

    #[error("Failed to read '{filename}': {source}")]
    Read {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{filename}': {source}")]
    Parse {
        filename: String,
        #[source]
        source: csv_async::Error,
    },

    #[error("Bulk write failed with non-duplicate errors: {}", summarize(.errors))]
    BulkWrite { errors: Vec<WriteError> },

    #[error(transparent)]
    Database(#[from] DbError),
}

impl IngestError {
    /// Errors the submitter can fix by changing the request
    pub fn is_validation(&self) -> bool {
        matches!(self, IngestError::NoFiles)
    }

    /// Errors caused by the state of another job
    pub fn is_conflict(&self) -> bool {
        matches!(self, IngestError::JobInProgress | IngestError::JobRunning(_))
    }
}

fn summarize(errors: &[WriteError]) -> String {
    match errors.first() {
        Some(first) if errors.len() > 1 => {
            format!("{} (and {} more)", first.message, errors.len() - 1)
        },
        Some(first) => first.message.clone(),
        None => "unknown error".to_string(),
    }
}
