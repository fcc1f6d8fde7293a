//! PostgreSQL order repository and its transactional unit of work

use common::{
    error::{DatabaseError, DatabaseResult},
    pagination::Pagination,
};
use sqlx::{Acquire, PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    ORDERS_NUMBER_KEY, OrderItemRepository, OrderRepository, OrderStore, OrderTransaction,
    product::{PRODUCT_COLUMNS, adjust_stock},
};
use crate::models::{Order, OrderItem, OrderStatus, Product};

const ORDER_COLUMNS: &str = "id, customer_id, order_number, status, total_amount, \
     shipping_address, billing_address, notes, order_date, shipped_date, delivered_date, \
     created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, quantity, unit_price, total_price, created_at, updated_at";

#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl OrderRepository for PgOrderRepository {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn find_by_number(&self, order_number: &str) -> DatabaseResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn list(&self, page: Pagination) -> DatabaseResult<Vec<Order>> {
        let page = page.normalized();
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY order_date DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn list_by_customer(
        &self,
        customer_id: Uuid,
        page: Pagination,
    ) -> DatabaseResult<Vec<Order>> {
        let page = page.normalized();
        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE customer_id = $1
            ORDER BY order_date DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(customer_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn list_by_status(
        &self,
        status: OrderStatus,
        page: Pagination,
    ) -> DatabaseResult<Vec<Order>> {
        let page = page.normalized();
        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE status = $1
            ORDER BY order_date DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(status)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }
}

impl OrderItemRepository for PgOrderRepository {
    async fn find_item(&self, id: Uuid) -> DatabaseResult<Option<OrderItem>> {
        let item = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    async fn list_by_order(&self, order_id: Uuid) -> DatabaseResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY created_at, id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

impl OrderStore for PgOrderRepository {
    type Tx = PgOrderTransaction;

    async fn begin(&self) -> DatabaseResult<PgOrderTransaction> {
        let tx = self.pool.begin().await.map_err(DatabaseError::Connection)?;
        Ok(PgOrderTransaction { tx })
    }
}

/// Open Postgres transaction; rolled back on drop unless committed
pub struct PgOrderTransaction {
    tx: Transaction<'static, Postgres>,
}

impl OrderTransaction for PgOrderTransaction {
    async fn lock_products(&mut self, ids: &[Uuid]) -> DatabaseResult<Vec<Product>> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        debug!("Locked {} of {} product rows", products.len(), ids.len());
        Ok(products)
    }

    async fn update_stock(&mut self, product_id: Uuid, delta: i32) -> DatabaseResult<bool> {
        adjust_stock(&mut *self.tx, product_id, delta).await
    }

    async fn insert_order(&mut self, order: &Order) -> DatabaseResult<bool> {
        // Savepoint, so a taken number does not abort the whole transaction
        let mut savepoint = Acquire::begin(&mut *self.tx).await?;

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO orders ({ORDER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#
        ))
        .bind(order.id)
        .bind(order.customer_id)
        .bind(&order.order_number)
        .bind(order.status)
        .bind(order.total_amount)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(&order.notes)
        .bind(order.order_date)
        .bind(order.shipped_date)
        .bind(order.delivered_date)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *savepoint)
        .await;

        match result.map_err(DatabaseError::from) {
            Ok(_) => {
                savepoint.commit().await?;
                info!("Inserted order {}", order.order_number);
                Ok(true)
            }
            Err(e) if e.is_unique_violation_on(ORDERS_NUMBER_KEY) => {
                savepoint.rollback().await?;
                debug!("Order number {} already taken", order.order_number);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn insert_item(&mut self, item: &OrderItem) -> DatabaseResult<()> {
        sqlx::query(&format!(
            "INSERT INTO order_items ({ITEM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(item.id)
        .bind(item.order_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_order(&mut self, id: Uuid) -> DatabaseResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(order)
    }

    async fn items_for_order(&mut self, order_id: Uuid) -> DatabaseResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY created_at, id"
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(items)
    }

    async fn update_order(&mut self, order: &Order) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, shipping_address = $3, billing_address = $4, notes = $5,
                shipped_date = $6, delivered_date = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(order.status)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(&order.notes)
        .bind(order.shipped_date)
        .bind(order.delivered_date)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_status(&mut self, id: Uuid, status: OrderStatus) -> DatabaseResult<bool> {
        let result =
            sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status)
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_order(&mut self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> DatabaseResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
