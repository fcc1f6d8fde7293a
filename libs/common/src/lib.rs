//! Common library for the storefront services
//!
//! This crate provides shared functionality used across the auth and api
//! services, including configuration, database connectivity, error
//! handling, logging setup and pagination.

pub mod config;
pub mod database;
pub mod error;
pub mod pagination;
pub mod telemetry;

/// Example usage of the database module
///
/// ```rust,no_run
/// use common::{config::Settings, database::{DatabaseConfig, init_pool, health_check}};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let settings = Settings::load()?;
///     let config = DatabaseConfig::from_settings(&settings.database)?;
///     let pool = init_pool(&config).await?;
///     let is_healthy = health_check(&pool).await?;
///     println!("Database health check: {}", is_healthy);
///     Ok(())
/// }
/// ```
pub use database::DatabaseConfig;
