use bulkload_common::types::IngestionJob;
use uuid::Uuid;

use crate::ingest::{IngestResult, JobOrchestrator};

#[derive(Debug, Clone)]
pub struct GetIngestionQuery {
    pub job_id: Uuid,
}

#[tracing::instrument(skip(orchestrator))]
pub async fn handle(
    orchestrator: &JobOrchestrator,
    query: GetIngestionQuery,
) -> IngestResult<IngestionJob> {
    orchestrator.find_job(query.job_id).await
}
