//! Storefront API
//!
//! Catalog management, the order lifecycle engine and the HTTP surface that
//! ties them to the authentication routes.

pub mod catalog;
pub mod error;
pub mod models;
pub mod notifications;
pub mod orders;
pub mod repositories;
pub mod routes;
pub mod server;
pub mod state;

pub use catalog::CatalogService;
pub use error::{ApiError, ApiResult};
pub use orders::{OrderNumberGenerator, OrderService};
pub use state::{AppState, Backend, Components, PgBackend, ServiceSettings};
