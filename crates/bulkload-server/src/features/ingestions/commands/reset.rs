use bulkload_common::types::IngestionJob;
use uuid::Uuid;

use crate::ingest::{IngestResult, JobOrchestrator};

#[derive(Debug, Clone)]
pub struct ResetIngestionCommand {
    pub job_id: Uuid,
}

#[tracing::instrument(skip(orchestrator))]
pub async fn handle(
    orchestrator: &JobOrchestrator,
    command: ResetIngestionCommand,
) -> IngestResult<IngestionJob> {
    orchestrator.reset_job(command.job_id).await
}
