//! Database module for handling PostgreSQL connections and operations
//!
//! This module provides connection pooling, configuration, migrations and
//! health checks for the PostgreSQL database.

use std::{env, str::FromStr, time::Duration};

use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
};
use tracing::{error, info};

use crate::{
    config::DatabaseSettings,
    error::{DatabaseError, DatabaseResult},
};

/// Database configuration struct
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection options for the target database
    pub connect_options: PgConnectOptions,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    pub min_connections: u32,
    /// Acquire timeout in seconds
    pub connection_timeout: u64,
}

impl DatabaseConfig {
    /// Build the configuration from the `database` settings section.
    ///
    /// `DATABASE_URL`, when set, takes precedence over the host/port/user
    /// fields so that tooling and tests can point at a throwaway database.
    pub fn from_settings(settings: &DatabaseSettings) -> DatabaseResult<Self> {
        let connect_options = match env::var("DATABASE_URL") {
            Ok(url) => parse_url(&url)?,
            Err(_) => {
                let ssl_mode = PgSslMode::from_str(&settings.sslmode).map_err(|e| {
                    DatabaseError::Configuration(format!(
                        "Invalid sslmode '{}': {}",
                        settings.sslmode, e
                    ))
                })?;
                PgConnectOptions::new()
                    .host(&settings.host)
                    .port(settings.port)
                    .username(&settings.user)
                    .password(&settings.password)
                    .database(&settings.dbname)
                    .ssl_mode(ssl_mode)
            }
        };

        Ok(Self {
            connect_options,
            max_connections: settings.max_connections,
            min_connections: settings.min_connections,
            connection_timeout: settings.connection_timeout,
        })
    }

    /// Create a new DatabaseConfig from environment variables
    ///
    /// # Environment Variables
    /// - `DATABASE_URL`: PostgreSQL connection URL (required)
    /// - `DATABASE_MAX_CONNECTIONS`: Maximum number of connections (default: 5)
    pub fn from_env() -> DatabaseResult<Self> {
        let database_url = env::var("DATABASE_URL").map_err(|_| {
            DatabaseError::Configuration("DATABASE_URL environment variable not set".to_string())
        })?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            connect_options: parse_url(&database_url)?,
            max_connections,
            min_connections: 1,
            connection_timeout: 30,
        })
    }
}

fn parse_url(url: &str) -> DatabaseResult<PgConnectOptions> {
    url.parse()
        .map_err(|e| DatabaseError::Configuration(format!("Invalid database URL: {}", e)))
}

/// Initialize a PostgreSQL connection pool
///
/// # Arguments
///
/// * `config` - Database configuration
///
/// # Returns
///
/// * `DatabaseResult<PgPool>` - PostgreSQL connection pool or error
pub async fn init_pool(config: &DatabaseConfig) -> DatabaseResult<PgPool> {
    info!("Initializing database connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout))
        .connect_with(config.connect_options.clone())
        .await
        .map_err(DatabaseError::Connection)?;

    info!("Database connection pool initialized successfully");
    Ok(pool)
}

/// Apply the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> DatabaseResult<()> {
    info!("Applying database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    Ok(())
}

/// Check database connectivity
///
/// # Arguments
///
/// * `pool` - PostgreSQL connection pool
///
/// # Returns
///
/// * `DatabaseResult<bool>` - True if the database answered, false otherwise
pub async fn health_check(pool: &PgPool) -> DatabaseResult<bool> {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => Ok(true),
        Err(e) => {
            error!("Database health check failed: {}", e);
            Ok(false)
        }
    }
}
