use futures::StreamExt;
use std::sync::Arc;
use tokio::io::{AsyncWrite, DuplexStream};

use crate::db::{DbError, RecordStore};

/// Header row of every export
pub const EXPORT_HEADER: [&str; 2] = ["accountNumber", "productCode"];

/// Attachment name used when the client does not pick one
pub const DEFAULT_EXPORT_FILENAME: &str = "account-products.csv";

const PIPE_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone, Default)]
pub struct ExportRecordsQuery {
    pub filename: Option<String>,
}

pub struct ExportRecordsResponse {
    pub filename: String,
    pub body: DuplexStream,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportRecordsError {
    #[error("Invalid export filename '{0}'")]
    InvalidFilename(String),
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv_async::Error),
    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl ExportRecordsQuery {
    pub fn validate(&self) -> Result<(), ExportRecordsError> {
        if let Some(name) = &self.filename {
            let trimmed = name.trim();
            let forbidden = |c: char| matches!(c, '"' | '/' | '\\') || c.is_control();
            if trimmed.is_empty() || trimmed.contains(forbidden) {
                return Err(ExportRecordsError::InvalidFilename(name.clone()));
            }
        }
        Ok(())
    }

    pub fn file_name(&self) -> String {
        self.filename
            .as_deref()
            .map(str::trim)
            .unwrap_or(DEFAULT_EXPORT_FILENAME)
            .to_string()
    }
}

/// Write every stored record as `accountNumber,productCode` rows after a header.
///
/// Returns the number of data rows written.
pub async fn export_records<W>(store: &dyn RecordStore, writer: W) -> Result<u64, ExportRecordsError>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut csv = csv_async::AsyncWriter::from_writer(writer);
    csv.write_record(EXPORT_HEADER).await?;

    let mut records = store.stream_all();
    let mut count: u64 = 0;
    while let Some(record) = records.next().await {
        let record = record?;
        csv.write_record([record.account_number.as_str(), record.product_code.as_str()])
            .await?;
        count += 1;
    }

    csv.flush().await?;
    Ok(count)
}

/// Start an export in the background and hand back the read side of the pipe.
///
/// Errors after the first byte cannot change the response status; they are
/// logged and the body ends early.
#[tracing::instrument(skip(store))]
pub fn handle(
    store: Arc<dyn RecordStore>,
    query: ExportRecordsQuery,
) -> Result<ExportRecordsResponse, ExportRecordsError> {
    query.validate()?;

    let (reader, writer) = tokio::io::duplex(PIPE_CAPACITY);
    let filename = query.file_name();

    tokio::spawn(async move {
        match export_records(store.as_ref(), writer).await {
            Ok(rows) => tracing::info!(rows, "Exported account products"),
            Err(e) => tracing::error!(error = %e, "Account product export aborted"),
        }
    });

    Ok(ExportRecordsResponse {
        filename,
        body: reader,
    })
}
