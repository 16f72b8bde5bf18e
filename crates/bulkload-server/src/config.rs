//! Configuration management

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ingest::IngestConfig;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/bulkload";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageBackend,
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Which backend holds records and jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow::anyhow!("Invalid BULKLOAD_STORAGE value: {}", other)),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Build configuration from the current environment only
    pub fn from_env() -> anyhow::Result<Self> {
        let storage = match std::env::var("BULKLOAD_STORAGE") {
            Ok(value) => value.parse()?,
            Err(_) => StorageBackend::default(),
        };

        let config = Config {
            server: ServerConfig {
                host: std::env::var("BULKLOAD_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_or("BULKLOAD_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "BULKLOAD_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            storage,
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                ),
            },
            ingest: IngestConfig::from_env()?,
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", true),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.storage == StorageBackend::Postgres {
            if self.database.url.is_empty() {
                anyhow::bail!("Database URL cannot be empty");
            }

            if self.database.max_connections == 0 {
                anyhow::bail!("Database max_connections must be greater than 0");
            }

            if self.database.min_connections > self.database.max_connections {
                anyhow::bail!(
                    "Database min_connections ({}) cannot be greater than max_connections ({})",
                    self.database.min_connections,
                    self.database.max_connections
                );
            }
        }

        self.ingest.validate()?;

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            storage: StorageBackend::default(),
            database: DatabaseConfig::default(),
            ingest: IngestConfig::default(),
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
        }
    }
}
