//! Account product API routes
//!
//! - `GET /api/v1/account-products/export` - Stream every record as CSV

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::queries::{ExportRecordsError, ExportRecordsQuery};
use crate::db::RecordStore;
use crate::error::AppError;

pub fn records_routes() -> Router<Arc<dyn RecordStore>> {
    Router::new().route("/export", get(export_records))
}

#[derive(Debug, Deserialize)]
struct ExportParams {
    filename: Option<String>,
}

/// Export all account products
///
/// # Endpoint
///
/// `GET /api/v1/account-products/export?filename=march.csv`
///
/// # Response
///
/// - `200 OK` - `text/csv` attachment, header row `accountNumber,productCode`
/// - `400 Bad Request` - Invalid filename
#[tracing::instrument(skip(store, params), fields(filename = ?params.filename))]
async fn export_records(
    State(store): State<Arc<dyn RecordStore>>,
    Query(params): Query<ExportParams>,
) -> Result<Response, AppError> {
    let query = ExportRecordsQuery {
        filename: params.filename,
    };

    let export = super::queries::export::handle(store, query)?;

    tracing::debug!(filename = %export.filename, "Account product export started via API");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        Body::from_stream(ReaderStream::new(export.body)),
    )
        .into_response())
}

impl From<ExportRecordsError> for AppError {
    fn from(err: ExportRecordsError) -> Self {
        match err {
            ExportRecordsError::InvalidFilename(_) => AppError::Validation(err.to_string()),
            ExportRecordsError::Database(e) => AppError::Database(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}
