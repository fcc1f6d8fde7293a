//! In-memory account repositories for tests

use std::{collections::HashMap, sync::Arc};

use common::{
    error::{DatabaseError, DatabaseResult},
    pagination::Pagination,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CUSTOMERS_EMAIL_KEY, CustomerRepository, USERS_EMAIL_KEY, UserRepository};
use crate::models::{Customer, User};

#[derive(Clone, Default)]
pub struct MemoryUserRepository {
    rows: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: &User) -> DatabaseResult<User> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|u| u.email == user.email) {
            return Err(DatabaseError::UniqueViolation(USERS_EMAIL_KEY.to_string()));
        }
        rows.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<User>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let rows = self.rows.read().await;
        Ok(rows.values().find(|u| u.email == email).cloned())
    }

    async fn list(&self, page: Pagination) -> DatabaseResult<Vec<User>> {
        let mut users: Vec<User> = self.rows.read().await.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page.apply(users))
    }

    async fn update(&self, user: &User) -> DatabaseResult<Option<User>> {
        let mut rows = self.rows.write().await;
        if rows
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(DatabaseError::UniqueViolation(USERS_EMAIL_KEY.to_string()));
        }
        match rows.get_mut(&user.id) {
            Some(row) => {
                *row = user.clone();
                Ok(Some(user.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        Ok(self.rows.write().await.remove(&id).is_some())
    }
}

#[derive(Clone, Default)]
pub struct MemoryCustomerRepository {
    rows: Arc<RwLock<HashMap<Uuid, Customer>>>,
}

impl MemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored customers
    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }
}

impl CustomerRepository for MemoryCustomerRepository {
    async fn create(&self, customer: &Customer) -> DatabaseResult<Customer> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|c| c.email == customer.email) {
            return Err(DatabaseError::UniqueViolation(
                CUSTOMERS_EMAIL_KEY.to_string(),
            ));
        }
        rows.insert(customer.id, customer.clone());
        Ok(customer.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Customer>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<Customer>> {
        let rows = self.rows.read().await;
        Ok(rows.values().find(|c| c.email == email).cloned())
    }

    async fn list(&self, page: Pagination) -> DatabaseResult<Vec<Customer>> {
        let mut customers: Vec<Customer> = self.rows.read().await.values().cloned().collect();
        customers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page.apply(customers))
    }

    async fn update(&self, customer: &Customer) -> DatabaseResult<Option<Customer>> {
        let mut rows = self.rows.write().await;
        if rows
            .values()
            .any(|c| c.id != customer.id && c.email == customer.email)
        {
            return Err(DatabaseError::UniqueViolation(
                CUSTOMERS_EMAIL_KEY.to_string(),
            ));
        }
        match rows.get_mut(&customer.id) {
            Some(row) => {
                *row = customer.clone();
                Ok(Some(customer.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        Ok(self.rows.write().await.remove(&id).is_some())
    }
}
