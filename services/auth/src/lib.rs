//! Authentication for the storefront
//!
//! Locally issued HS256 access/refresh tokens for staff Users, an OpenID
//! Connect client with just-in-time provisioning for Customers, account
//! management, and the axum middleware that turns either credential into a
//! request principal.

pub mod accounts;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod oidc;
pub mod password;
pub mod rate_limiter;
pub mod repositories;
pub mod routes;
pub mod service;
pub mod validation;

pub use accounts::AccountService;
pub use error::{AuthError, AuthResult};
pub use jwt::{JwtConfig, JwtService, PrincipalKind, TokenPair};
pub use middleware::{Authenticator, CustomerInfo, UserInfo};
pub use oidc::{OidcClient, OidcConfig};
pub use service::AuthService;
