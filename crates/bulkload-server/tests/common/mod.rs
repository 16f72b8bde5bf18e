//! Shared helpers for PostgreSQL integration tests
//!
//! Each test starts its own PostgreSQL container with the workspace
//! migrations applied. These tests need a running Docker daemon and are
//! marked `#[ignore]`:
//!
//! ```bash
//! cargo test -p bulkload-server --test postgres_backend -- --ignored --nocapture
//! ```

#![allow(dead_code)]

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

/// PostgreSQL image tag used by the tests
pub const POSTGRES_TAG: &str = "16-alpine";

/// PostgreSQL test container with migrations applied
pub struct TestPostgres {
    // keeps the container alive for the lifetime of the pool
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag(POSTGRES_TAG)
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }
}

/// Initialize tracing for tests; safe to call more than once.
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,bulkload_server=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}

/// A two-column CSV body with header and `rows` distinct data rows.
pub fn csv_rows(rows: usize) -> Vec<u8> {
    let mut data = String::from("accountNumber,productCode\n");
    for i in 0..rows {
        data.push_str(&format!("{:014},P{}\n", i, i % 10));
    }
    data.into_bytes()
}
