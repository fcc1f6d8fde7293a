//! Account management: owner-driven User operations and staff-driven
//! Customer CRUD.

use chrono::Utc;
use common::{error::DatabaseError, pagination::Pagination};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    models::{Customer, NewCustomer, UpdateCustomer, UpdateUser, User},
    password,
    repositories::{CUSTOMERS_EMAIL_KEY, CustomerRepository, USERS_EMAIL_KEY, UserRepository},
    validation,
};

pub struct AccountService<U: UserRepository, C: CustomerRepository> {
    users: U,
    customers: C,
}

impl<U: UserRepository, C: CustomerRepository> AccountService<U, C> {
    pub fn new(users: U, customers: C) -> Self {
        Self { users, customers }
    }

    pub async fn get_user(&self, id: Uuid) -> AuthResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::NotFound("user"))
    }

    pub async fn list_users(&self, page: Pagination) -> AuthResult<Vec<User>> {
        Ok(self.users.list(page).await?)
    }

    pub async fn update_user(&self, id: Uuid, patch: UpdateUser) -> AuthResult<User> {
        let mut user = self.get_user(id).await?;

        if let Some(name) = patch.name {
            validation::validate_name(&name).map_err(AuthError::Validation)?;
            user.name = name.trim().to_string();
        }
        if let Some(email) = patch.email {
            let email = validation::normalize_email(&email);
            validation::validate_email(&email).map_err(AuthError::Validation)?;
            user.email = email;
        }
        if let Some(new_password) = patch.password {
            validation::validate_password(&new_password).map_err(AuthError::Validation)?;
            user.password_hash = password::hash_password(&new_password)?;
        }
        user.updated_at = Utc::now();

        self.users
            .update(&user)
            .await
            .map_err(|e| email_conflict(e, USERS_EMAIL_KEY))?
            .ok_or(AuthError::NotFound("user"))
    }

    pub async fn delete_user(&self, id: Uuid) -> AuthResult<()> {
        if !self.users.delete(id).await? {
            return Err(AuthError::NotFound("user"));
        }
        info!("Deleted user {}", id);
        Ok(())
    }

    pub async fn create_customer(&self, input: NewCustomer) -> AuthResult<Customer> {
        let mut input = input;
        input.email = validation::normalize_email(&input.email);
        validation::validate_name(&input.first_name).map_err(AuthError::Validation)?;
        validation::validate_email(&input.email).map_err(AuthError::Validation)?;

        if self.customers.find_by_email(&input.email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let customer = self
            .customers
            .create(&Customer::new(input))
            .await
            .map_err(|e| email_conflict(e, CUSTOMERS_EMAIL_KEY))?;

        info!("Created customer {}", customer.id);
        Ok(customer)
    }

    pub async fn get_customer(&self, id: Uuid) -> AuthResult<Customer> {
        self.customers
            .find_by_id(id)
            .await?
            .ok_or(AuthError::NotFound("customer"))
    }

    pub async fn get_customer_by_email(&self, email: &str) -> AuthResult<Customer> {
        self.customers
            .find_by_email(&validation::normalize_email(email))
            .await?
            .ok_or(AuthError::NotFound("customer"))
    }

    pub async fn list_customers(&self, page: Pagination) -> AuthResult<Vec<Customer>> {
        Ok(self.customers.list(page).await?)
    }

    pub async fn update_customer(&self, id: Uuid, patch: UpdateCustomer) -> AuthResult<Customer> {
        let mut patch = patch;
        if let Some(first_name) = &patch.first_name {
            validation::validate_name(first_name).map_err(AuthError::Validation)?;
        }
        if let Some(email) = patch.email.take() {
            let email = validation::normalize_email(&email);
            validation::validate_email(&email).map_err(AuthError::Validation)?;
            patch.email = Some(email);
        }

        let mut customer = self.get_customer(id).await?;
        customer.apply(patch);

        self.customers
            .update(&customer)
            .await
            .map_err(|e| email_conflict(e, CUSTOMERS_EMAIL_KEY))?
            .ok_or(AuthError::NotFound("customer"))
    }

    /// Remove a customer; refused while orders still reference it
    pub async fn delete_customer(&self, id: Uuid) -> AuthResult<()> {
        match self.customers.delete(id).await {
            Ok(true) => {
                info!("Deleted customer {}", id);
                Ok(())
            }
            Ok(false) => Err(AuthError::NotFound("customer")),
            Err(DatabaseError::ForeignKeyViolation(_)) => Err(AuthError::InvalidState(
                "customer still has orders".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

pub(crate) fn email_conflict(err: DatabaseError, constraint: &str) -> AuthError {
    if err.is_unique_violation_on(constraint) {
        AuthError::EmailTaken
    } else {
        AuthError::Store(err)
    }
}
