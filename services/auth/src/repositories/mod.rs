//! Persistence contracts for accounts
//!
//! Absent rows are `Ok(None)` (or `false` for deletes); store failures
//! propagate as [`DatabaseError`], with unique violations surfaced as
//! [`DatabaseError::UniqueViolation`].

use common::{error::DatabaseResult, pagination::Pagination};
use uuid::Uuid;

use crate::models::{Customer, User};

pub mod customer;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod user;

pub use customer::PgCustomerRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{MemoryCustomerRepository, MemoryUserRepository};
pub use user::PgUserRepository;

pub const USERS_EMAIL_KEY: &str = "users_email_key";
pub const CUSTOMERS_EMAIL_KEY: &str = "customers_email_key";

pub trait UserRepository: Clone + Send + Sync + 'static {
    fn create(&self, user: &User) -> impl Future<Output = DatabaseResult<User>> + Send;
    fn find_by_id(&self, id: Uuid) -> impl Future<Output = DatabaseResult<Option<User>>> + Send;
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = DatabaseResult<Option<User>>> + Send;
    /// Newest first
    fn list(&self, page: Pagination) -> impl Future<Output = DatabaseResult<Vec<User>>> + Send;
    /// Full replace by primary key; `None` when the row is gone
    fn update(&self, user: &User) -> impl Future<Output = DatabaseResult<Option<User>>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = DatabaseResult<bool>> + Send;
}

pub trait CustomerRepository: Clone + Send + Sync + 'static {
    fn create(&self, customer: &Customer) -> impl Future<Output = DatabaseResult<Customer>> + Send;
    fn find_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = DatabaseResult<Option<Customer>>> + Send;
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = DatabaseResult<Option<Customer>>> + Send;
    /// Newest first
    fn list(&self, page: Pagination)
    -> impl Future<Output = DatabaseResult<Vec<Customer>>> + Send;
    fn update(
        &self,
        customer: &Customer,
    ) -> impl Future<Output = DatabaseResult<Option<Customer>>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = DatabaseResult<bool>> + Send;
}
