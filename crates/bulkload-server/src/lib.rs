//! Bulkload Server Library
//!
//! HTTP service that ingests large delimited files of account/product pairs
//! into a keyed record store.
//!
//! # Overview
//!
//! - **Submission**: multipart uploads are spooled to disk and accepted as a
//!   PENDING job; the request returns `202 Accepted` immediately
//! - **Execution**: one background task per job streams each file through
//!   decompression, parsing, validation and batched bulk inserts
//! - **Admission**: at most one job is PENDING or RUNNING at any time
//! - **Progress**: counters and a monotonic percentage are persisted while the
//!   job runs and can be polled
//! - **Export**: the record collection streams back out as CSV
//!
//! # Modules
//!
//! - [`ingest`]: row ingestor, bulk write classification, progress, orchestrator
//! - [`db`]: `RecordStore` / `JobRepository` traits with PostgreSQL and in-memory backends
//! - [`features`]: axum routes, one slice per resource
//! - [`config`]: environment based configuration
//!
//! # Example
//!
//! ```no_run
//! use bulkload_server::{api, config::Config, db, features::FeatureState, ingest::JobOrchestrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let records = Arc::new(db::InMemoryRecordStore::new());
//!     let jobs = Arc::new(db::InMemoryJobRepository::new());
//!     let orchestrator = JobOrchestrator::new(jobs, records.clone(), &config.ingest);
//!     let state = FeatureState {
//!         orchestrator,
//!         records,
//!         max_upload_bytes: config.ingest.max_upload_bytes,
//!     };
//!     let app = api::create_router(state, &config);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

// Re-export commonly used types
pub use error::{ApiResult, AppError};
