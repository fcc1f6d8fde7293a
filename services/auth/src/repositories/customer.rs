//! PostgreSQL customer repository

use common::{error::DatabaseResult, pagination::Pagination};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::CustomerRepository;
use crate::models::Customer;

const CUSTOMER_COLUMNS: &str = "id, first_name, last_name, email, phone, address_line1, \
     address_line2, city, state, postal_code, country, created_at, updated_at";

#[derive(Clone)]
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CustomerRepository for PgCustomerRepository {
    async fn create(&self, customer: &Customer) -> DatabaseResult<Customer> {
        info!("Creating new customer: {}", customer.email);

        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            INSERT INTO customers ({CUSTOMER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(customer.id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address_line1)
        .bind(&customer.address_line2)
        .bind(&customer.city)
        .bind(&customer.state)
        .bind(&customer.postal_code)
        .bind(&customer.country)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn list(&self, page: Pagination) -> DatabaseResult<Vec<Customer>> {
        let page = page.normalized();
        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    async fn update(&self, customer: &Customer) -> DatabaseResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            r#"
            UPDATE customers
            SET first_name = $2, last_name = $3, email = $4, phone = $5,
                address_line1 = $6, address_line2 = $7, city = $8, state = $9,
                postal_code = $10, country = $11, updated_at = $12
            WHERE id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(customer.id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address_line1)
        .bind(&customer.address_line2)
        .bind(&customer.city)
        .bind(&customer.state)
        .bind(&customer.postal_code)
        .bind(&customer.country)
        .bind(customer.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        info!("Deleting customer: {}", id);

        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
