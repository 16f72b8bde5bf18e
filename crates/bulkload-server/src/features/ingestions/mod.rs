//! Ingestion jobs
//!
//! Submission spools the multipart upload and hands it to the
//! [`JobOrchestrator`](crate::ingest::JobOrchestrator); the other endpoints
//! read and manage the resulting job records.

pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{
    DeleteIngestionCommand, ResetIngestionCommand, SubmitIngestionCommand,
    SubmitIngestionResponse,
};
pub use queries::GetIngestionQuery;
pub use routes::ingestions_routes;
