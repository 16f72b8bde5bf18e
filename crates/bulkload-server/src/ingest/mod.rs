//! Bulk ingestion core
//!
//! # Architecture
//!
//! - **compression**: gzip detection by filename and stream decoding
//! - **bulk_write**: classifies bulk insert outcomes into inserted/duplicate counts or a fatal error
//! - **row_ingestor**: streams one file through decode, parse, validate, batch and flush
//! - **progress**: throttled, monotonic job progress
//! - **spool**: copies uploads to temp files for the background task
//! - **orchestrator**: job admission, lifecycle and background execution
//! - **config**: `INGEST_*` tuning
//!
//! # Public API
//!
//! The HTTP endpoints live in `features::ingestions`:
//! - `POST /api/v1/ingestions` - Submit files
//! - `GET /api/v1/ingestions/:id` - Job status
//! - `POST /api/v1/ingestions/:id/reset` - Reset a job
//! - `DELETE /api/v1/ingestions/:id` - Delete a job

pub mod bulk_write;
pub mod compression;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod row_ingestor;
pub mod spool;

pub use bulk_write::{classify, BulkWriteSummary};
pub use config::IngestConfig;
pub use error::{IngestError, IngestResult};
pub use orchestrator::JobOrchestrator;
pub use progress::{ProgressListener, ProgressReporter};
pub use row_ingestor::{estimate_record_count, RowIngestor};
pub use spool::{Spool, SpooledFile};
