use uuid::Uuid;

use crate::ingest::{IngestResult, JobOrchestrator};

#[derive(Debug, Clone)]
pub struct DeleteIngestionCommand {
    pub job_id: Uuid,
}

#[tracing::instrument(skip(orchestrator))]
pub async fn handle(
    orchestrator: &JobOrchestrator,
    command: DeleteIngestionCommand,
) -> IngestResult<()> {
    orchestrator.delete_job(command.job_id).await
}
