//! Authentication service models

pub mod customer;
pub mod user;

// Re-export for convenience
pub use customer::{Customer, NewCustomer, UpdateCustomer};
pub use user::{LoginCredentials, NewUser, UpdateUser, User};
