//! Ingestion API routes
//!
//! # Route Structure
//!
//! - `POST /api/v1/ingestions` - Submit files for ingestion
//! - `GET /api/v1/ingestions/:job_id` - Get a job snapshot
//! - `POST /api/v1/ingestions/:job_id/reset` - Reset a job to PENDING
//! - `DELETE /api/v1/ingestions/:job_id` - Delete a job record

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{
    commands::{DeleteIngestionCommand, ResetIngestionCommand, SubmitIngestionCommand},
    queries::GetIngestionQuery,
};
use crate::api::response::ApiResponse;
use crate::error::{ApiResult, AppError};
use crate::ingest::JobOrchestrator;

/// Multipart part carrying an uploaded file; may repeat
pub const FILES_FIELD: &str = "files";

/// Multipart text part (or query parameter) requesting a pre-clear
pub const DELETE_EXISTING_FIELD: &str = "deleteExisting";

// ============================================================================
// Router Configuration
// ============================================================================

/// Creates the ingestions router
///
/// `body_limit` caps the size of a submission request body.
pub fn ingestions_routes(body_limit: usize) -> Router<JobOrchestrator> {
    Router::new()
        .route(
            "/",
            post(submit_ingestion).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/:job_id", get(get_ingestion).delete(delete_ingestion))
        .route("/:job_id/reset", post(reset_ingestion))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitParams {
    delete_existing: Option<bool>,
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// Submit files for ingestion
///
/// # Endpoint
///
/// `POST /api/v1/ingestions?deleteExisting=true`
///
/// # Request Body
///
/// `multipart/form-data` with one or more `files` parts. `deleteExisting` may
/// also be sent as a text part.
///
/// # Response
///
/// - `202 Accepted` - Job created, `Location` points at the job
/// - `400 Bad Request` - No usable files or malformed form
/// - `409 Conflict` - Another job is PENDING or RUNNING
#[tracing::instrument(skip(orchestrator, params, multipart))]
async fn submit_ingestion(
    State(orchestrator): State<JobOrchestrator>,
    Query(params): Query<SubmitParams>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    // reject before spooling a large body
    orchestrator.ensure_admissible().await?;

    let mut command = SubmitIngestionCommand::default();
    let mut form_flag = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILES_FIELD => {
                let filename = field.file_name().map(str::to_string);
                let spooled = orchestrator
                    .spool()
                    .spool_stream(filename.as_deref(), Box::pin(field))
                    .await?;
                command.files.push(spooled);
            },
            DELETE_EXISTING_FIELD => {
                let text = field.text().await.map_err(invalid_form)?;
                form_flag = Some(parse_flag(&text)?);
            },
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            },
        }
    }

    command.delete_existing = form_flag.or(params.delete_existing).unwrap_or(false);

    let response = super::commands::submit::handle(&orchestrator, command).await?;

    tracing::info!(
        job_id = %response.job_id,
        files = response.file_count,
        delete_existing = response.delete_existing,
        "Ingestion job submitted via API"
    );

    let location = format!("/api/v1/ingestions/{}", response.job_id);
    Ok((
        StatusCode::ACCEPTED,
        [(header::LOCATION, location)],
        Json(ApiResponse::success(response)),
    )
        .into_response())
}

/// Reset a job
///
/// # Endpoint
///
/// `POST /api/v1/ingestions/:job_id/reset`
///
/// # Response
///
/// - `200 OK` - The reset job
/// - `404 Not Found` - Unknown job
/// - `409 Conflict` - Another job is active
#[tracing::instrument(skip(orchestrator))]
async fn reset_ingestion(
    State(orchestrator): State<JobOrchestrator>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let command = ResetIngestionCommand {
        job_id: parse_job_id(&job_id)?,
    };

    let job = super::commands::reset::handle(&orchestrator, command).await?;

    tracing::info!(job_id = %job.id, "Ingestion job reset via API");

    Ok((StatusCode::OK, Json(ApiResponse::success(job))).into_response())
}

/// Delete a job record
///
/// # Endpoint
///
/// `DELETE /api/v1/ingestions/:job_id`
///
/// # Response
///
/// - `204 No Content` - Deleted
/// - `404 Not Found` - Unknown job
/// - `409 Conflict` - The job is RUNNING
#[tracing::instrument(skip(orchestrator))]
async fn delete_ingestion(
    State(orchestrator): State<JobOrchestrator>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let command = DeleteIngestionCommand {
        job_id: parse_job_id(&job_id)?,
    };

    super::commands::delete::handle(&orchestrator, command).await?;

    tracing::info!(job_id = %job_id, "Ingestion job deleted via API");

    Ok(StatusCode::NO_CONTENT.into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

/// Get a job snapshot
///
/// # Endpoint
///
/// `GET /api/v1/ingestions/:job_id`
///
/// # Response
///
/// - `200 OK` - Status, counters, progress and per-file entries
/// - `404 Not Found` - Unknown job
#[tracing::instrument(skip(orchestrator))]
async fn get_ingestion(
    State(orchestrator): State<JobOrchestrator>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let query = GetIngestionQuery {
        job_id: parse_job_id(&job_id)?,
    };

    let job = super::queries::get_job::handle(&orchestrator, query).await?;

    tracing::debug!(
        job_id = %job.id,
        status = %job.status,
        progress = job.progress_percent,
        "Ingestion job retrieved via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(job))).into_response())
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_job_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("Invalid job id '{}'", raw)))
}

fn parse_flag(raw: &str) -> ApiResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "off" => Ok(false),
        "true" | "1" | "yes" | "on" => Ok(true),
        other => Err(AppError::Validation(format!(
            "Invalid {} value '{}'",
            DELETE_EXISTING_FIELD, other
        ))),
    }
}

fn invalid_form(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Invalid multipart body: {}", err))
}
