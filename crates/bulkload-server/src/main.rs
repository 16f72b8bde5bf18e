//! Bulkload Server - Main entry point

use anyhow::Result;
use bulkload_common::logging::{init_logging, LogConfig};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{info, warn};

use bulkload_server::{
    api,
    config::{Config, StorageBackend},
    db::{self, InMemoryJobRepository, InMemoryRecordStore, JobRepository, RecordStore},
    features::FeatureState,
    ingest::JobOrchestrator,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let log_config = LogConfig::builder()
        .log_file_prefix("bulkload-server")
        .filter_directives("bulkload_server=debug,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;

    // flushes file logs on drop
    let _log_guard = init_logging(&log_config)?;

    info!("Starting bulkload server");

    let config = Config::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        storage = ?config.storage,
        batch_size = config.ingest.batch_size,
        "Configuration loaded"
    );

    let (records, jobs) = open_storage(&config).await?;

    let orchestrator = JobOrchestrator::new(jobs, records.clone(), &config.ingest);
    let interrupted = orchestrator.fail_interrupted().await?;
    if interrupted > 0 {
        warn!(jobs = interrupted, "Failed ingestion jobs interrupted by the last shutdown");
    }
    let state = FeatureState {
        orchestrator: orchestrator.clone(),
        records,
        max_upload_bytes: config.ingest.max_upload_bytes,
    };

    let app = api::create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    if orchestrator.shutdown(timeout).await {
        info!("Server shut down gracefully");
    } else {
        warn!(
            timeout_secs = config.server.shutdown_timeout_secs,
            "Ingestion jobs still running at shutdown; they are failed on next start"
        );
    }

    Ok(())
}

async fn open_storage(
    config: &Config,
) -> Result<(Arc<dyn RecordStore>, Arc<dyn JobRepository>)> {
    match config.storage {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; records and jobs are lost on restart");
            let records: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
            let jobs: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
            Ok((records, jobs))
        },
        StorageBackend::Postgres => {
            let pool = db::create_pool(&config.database).await?;
            info!("Database connection pool established");

            sqlx::migrate!("../../migrations")
                .run(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
            info!("Database migrations completed");

            let records: Arc<dyn RecordStore> = Arc::new(db::PgRecordStore::new(pool.clone()));
            let jobs: Arc<dyn JobRepository> = Arc::new(db::PgJobRepository::new(pool));
            Ok((records, jobs))
        },
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
