//! Shared domain types
//!
//! - [`record`]: the `AccountProduct` record and its composite key
//! - [`job`]: ingestion jobs, per-file status entries and counters

pub mod job;
pub mod record;

pub use job::{
    FileResult, FileStatus, IngestionJob, JobFile, JobStatus, JobTotals, UNKNOWN_ESTIMATE,
};
pub use record::{
    AccountProduct, RecordError, ACCOUNT_NUMBER_MAX_LEN, ID_DELIMITER, PRODUCT_CODE_MAX_LEN,
};
