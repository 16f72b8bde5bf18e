//! Bulk write classification
//!
//! Writes are insert-only and keyed by the composite record id, so a
//! duplicate-key failure means the row is already stored and is counted, not
//! raised. Any other per-operation failure, or a failed call, aborts the file.

use crate::db::{BulkWriteOutcome, DbResult};

use super::error::{IngestError, IngestResult};

/// Counts from one flushed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkWriteSummary {
    pub inserted: i64,
    pub duplicates: i64,
}

/// Turn a bulk insert result into counts, or a fatal error.
pub fn classify(result: DbResult<BulkWriteOutcome>) -> IngestResult<BulkWriteSummary> {
    match result? {
        BulkWriteOutcome::Acknowledged { inserted } => Ok(BulkWriteSummary {
            inserted,
            duplicates: 0,
        }),
        BulkWriteOutcome::Partial { inserted, errors } => {
            let (duplicates, fatal): (Vec<_>, Vec<_>) =
                errors.into_iter().partition(|e| e.is_duplicate_key());

            if !fatal.is_empty() {
                return Err(IngestError::BulkWrite { errors: fatal });
            }

            Ok(BulkWriteSummary {
                inserted,
                duplicates: duplicates.len() as i64,
            })
        },
    }
}
