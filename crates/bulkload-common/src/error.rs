//! Error types shared across the workspace

use thiserror::Error;

/// Main error type for shared bulkload code
#[derive(Error, Debug)]
pub enum BulkloadError {
    #[error("Unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

impl BulkloadError {
    /// Error for a persisted enum string that matches no variant
    pub fn unknown_variant(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}
