//! PostgreSQL product repository

use common::{error::DatabaseResult, pagination::Pagination};
use sqlx::{PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

use super::ProductRepository;
use crate::models::Product;

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, description, price, stock_quantity, sku, \
     category_id, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Guarded stock adjustment shared with the order transaction
pub(crate) async fn adjust_stock<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    delta: i32,
) -> DatabaseResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_quantity = stock_quantity + $2, updated_at = NOW()
        WHERE id = $1 AND stock_quantity + $2 >= 0
        "#,
    )
    .bind(id)
    .bind(delta)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

impl ProductRepository for PgProductRepository {
    async fn create(&self, product: &Product) -> DatabaseResult<Product> {
        info!("Creating product: {}", product.sku);

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products ({PRODUCT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock_quantity)
        .bind(&product.sku)
        .bind(product.category_id)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn find_by_sku(&self, sku: &str) -> DatabaseResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn list(&self, page: Pagination) -> DatabaseResult<Vec<Product>> {
        let page = page.normalized();
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn list_by_category(
        &self,
        category_id: Uuid,
        page: Pagination,
    ) -> DatabaseResult<Vec<Product>> {
        let page = page.normalized();
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE category_id = $1
            ORDER BY name ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(category_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn update(&self, product: &Product) -> DatabaseResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = $2, description = $3, price = $4, sku = $5,
                category_id = $6, is_active = $7, updated_at = $8
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.sku)
        .bind(product.category_id)
        .bind(product.is_active)
        .bind(product.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn update_stock(&self, id: Uuid, delta: i32) -> DatabaseResult<bool> {
        adjust_stock(&self.pool, id, delta).await
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
