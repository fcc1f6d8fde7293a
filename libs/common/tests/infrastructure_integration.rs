//! Integration tests for the infrastructure components
//!
//! These tests verify that PostgreSQL is reachable and that the embedded
//! schema applies cleanly. They need `DATABASE_URL` and are ignored by
//! default: run them with `cargo test -- --ignored`.

use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use sqlx::Row;

#[tokio::test]
#[ignore]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT 1 as result").fetch_one(&pool).await?;
    let result: i32 = row.get("result");
    assert_eq!(result, 1, "PostgreSQL simple query test failed");

    // Applying twice must be a no-op
    run_migrations(&pool).await?;
    run_migrations(&pool).await?;

    let row = sqlx::query(
        "SELECT COUNT(*) AS tables FROM information_schema.tables \
         WHERE table_schema = 'public' \
         AND table_name IN ('users', 'customers', 'categories', 'products', 'orders', 'order_items')",
    )
    .fetch_one(&pool)
    .await?;
    let tables: i64 = row.get("tables");
    assert_eq!(tables, 6, "schema is missing tables");

    Ok(())
}
