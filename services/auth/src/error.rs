//! Error type shared by the authentication service, the OIDC client and
//! the request middleware

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password; the two are never distinguished
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email already registered")]
    EmailTaken,

    /// Missing or malformed bearer credential
    #[error("authentication required")]
    Unauthenticated,

    #[error("token expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("OIDC provider is not configured")]
    ProviderUnconfigured,

    #[error("OIDC provider error: {0}")]
    Provider(String),

    /// The `state` returned by the provider does not match the one issued
    #[error("OIDC state mismatch")]
    StateMismatch,

    #[error("authorization denied by provider: {0}")]
    AuthorizationDenied(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    /// The entity is still referenced and cannot be removed
    #[error("{0}")]
    InvalidState(String),

    #[error("too many login attempts, try again later")]
    RateLimited,

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl AuthError {
    /// Stable machine-readable code carried in every error body
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials | AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::TokenExpired | AuthError::TokenInvalid(_) => "UNAUTHORIZED_TOKEN",
            AuthError::EmailTaken => "ALREADY_EXISTS",
            AuthError::ProviderUnconfigured => "PROVIDER_UNCONFIGURED",
            AuthError::Provider(_) => "PROVIDER_ERROR",
            AuthError::StateMismatch
            | AuthError::AuthorizationDenied(_)
            | AuthError::Validation(_) => "BAD_REQUEST",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::InvalidState(_) => "INVALID_STATE",
            AuthError::RateLimited => "RATE_LIMITED",
            AuthError::Crypto(_) => "INTERNAL_ERROR",
            AuthError::Store(_) => "STORE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::Unauthenticated
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_) => StatusCode::UNAUTHORIZED,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::StateMismatch
            | AuthError::AuthorizationDenied(_)
            | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::ProviderUnconfigured
            | AuthError::Provider(_)
            | AuthError::Crypto(_)
            | AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::Crypto(_) | AuthError::Store(_) => {
                error!("Authentication failure: {}", self);
                "internal server error".to_string()
            }
            AuthError::Provider(_) => {
                error!("{}", self);
                self.to_string()
            }
            AuthError::TokenInvalid(_) => {
                warn!("{}", self);
                "invalid token".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

/// Type alias for Result with AuthError
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_and_token_errors_are_unauthorized() {
        for err in [
            AuthError::InvalidCredentials,
            AuthError::Unauthenticated,
            AuthError::TokenExpired,
            AuthError::TokenInvalid("bad signature".into()),
        ] {
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn provider_errors_are_server_errors() {
        assert_eq!(
            AuthError::ProviderUnconfigured.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AuthError::Provider("boom".into()).code(), "PROVIDER_ERROR");
    }

    #[test]
    fn state_mismatch_is_bad_request() {
        assert_eq!(AuthError::StateMismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::StateMismatch.code(), "BAD_REQUEST");
    }
}
