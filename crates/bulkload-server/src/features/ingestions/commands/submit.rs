use bulkload_common::types::JobStatus;
use serde::Serialize;
use uuid::Uuid;

use crate::ingest::{IngestError, IngestResult, JobOrchestrator, SpooledFile};

#[derive(Debug, Default)]
pub struct SubmitIngestionCommand {
    pub files: Vec<SpooledFile>,
    pub delete_existing: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIngestionResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub file_count: usize,
    pub delete_existing: bool,
}

impl SubmitIngestionCommand {
    pub fn validate(&self) -> IngestResult<()> {
        if self.files.is_empty() {
            return Err(IngestError::NoFiles);
        }
        Ok(())
    }
}

#[tracing::instrument(
    skip(orchestrator, command),
    fields(files = command.files.len(), delete_existing = command.delete_existing)
)]
pub async fn handle(
    orchestrator: &JobOrchestrator,
    command: SubmitIngestionCommand,
) -> IngestResult<SubmitIngestionResponse> {
    command.validate()?;

    let job = orchestrator
        .enqueue(command.files, command.delete_existing)
        .await?;

    Ok(SubmitIngestionResponse {
        job_id: job.id,
        status: job.status,
        file_count: job.files.len(),
        delete_existing: job.delete_existing,
    })
}
