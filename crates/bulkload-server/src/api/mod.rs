pub mod response;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;

use crate::config::Config;
use crate::db::RecordStore;
use crate::features::{self, FeatureState};
use crate::middleware;

/// Build the full application router
pub fn create_router(state: FeatureState, config: &Config) -> Router {
    let health = Router::new()
        .route("/health", get(health))
        .with_state(state.records.clone());

    Router::new()
        .route("/", get(root))
        .merge(health)
        .nest("/api/v1", features::router(state))
        .layer(CompressionLayer::new())
        .layer(middleware::cors_layer(&config.cors))
        .layer(middleware::tracing_layer())
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "bulkload-server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health(State(records): State<Arc<dyn RecordStore>>) -> Response {
    match records.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
                .into_response()
        },
    }
}
