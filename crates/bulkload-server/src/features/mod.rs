//! Feature slices of the bulkload API
//!
//! # Features
//!
//! - **ingestions**: submit files, poll, reset and delete ingestion jobs
//! - **records**: export the ingested account products
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations
//! - `queries/` - Read operations
//! - `routes.rs` - HTTP route definitions

pub mod ingestions;
pub mod records;

use axum::Router;
use std::sync::Arc;

use crate::db::RecordStore;
use crate::ingest::JobOrchestrator;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Job admission and background execution
    pub orchestrator: JobOrchestrator,
    /// The ingested record collection
    pub records: Arc<dyn RecordStore>,
    /// Request body limit for submissions
    pub max_upload_bytes: usize,
}

/// Creates the main API router with all feature routes mounted
///
/// - `/ingestions` - Ingestion jobs
/// - `/account-products` - Record export
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest(
            "/ingestions",
            ingestions::ingestions_routes(state.max_upload_bytes).with_state(state.orchestrator),
        )
        .nest("/account-products", records::records_routes().with_state(state.records))
}
