//! Bulkload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, validation, and logging for the bulkload workspace.
//!
//! # Overview
//!
//! - **Types**: the ingested `AccountProduct` record and the ingestion job model
//! - **Error Handling**: the shared `BulkloadError` type
//! - **Logging**: `tracing` subscriber configuration used by every binary
//!
//! # Example
//!
//! ```
//! use bulkload_common::types::AccountProduct;
//!
//! let record = AccountProduct::from_fields(" 12345678901234 ", "ABC").unwrap();
//! assert_eq!(record.id, "12345678901234|ABC");
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::BulkloadError;
