//! JWT service for token generation and validation
//!
//! Access and refresh tokens are HS256 JWS signed with two distinct
//! secrets, so one flavour can never be presented as the other. Expiry is
//! the only invalidation mechanism.

use chrono::Utc;
use common::config::AuthSettings;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC secret for access tokens
    pub access_secret: String,
    /// HMAC secret for refresh tokens
    pub refresh_secret: String,
    /// Access token expiration time in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    /// Build the configuration from the `auth` settings section
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            access_secret: settings.jwt_secret.clone(),
            refresh_secret: settings.jwt_refresh_secret.clone(),
            access_token_expiry: settings.jwt_expiry,
            refresh_token_expiry: settings.jwt_refresh_expiry,
        }
    }
}

/// Which principal table a token's `user_id` points into
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    #[default]
    User,
    Customer,
}

/// Access token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub kind: PrincipalKind,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Refresh token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub user_id: Uuid,
    #[serde(default)]
    pub kind: PrincipalKind,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Response for token generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    validation: Validation,
    access_token_expiry: u64,
    refresh_token_expiry: u64,
}

impl JwtService {
    /// Initialize a new JWT service
    ///
    /// Fails when either secret is empty or both secrets are equal.
    pub fn new(config: JwtConfig) -> AuthResult<Self> {
        if config.access_secret.is_empty() || config.refresh_secret.is_empty() {
            return Err(AuthError::Crypto(
                "JWT access and refresh secrets must be set".to_string(),
            ));
        }
        if config.access_secret == config.refresh_secret {
            return Err(AuthError::Crypto(
                "JWT access and refresh secrets must differ".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iat"]);

        Ok(JwtService {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            validation,
            access_token_expiry: config.access_token_expiry,
            refresh_token_expiry: config.refresh_token_expiry,
        })
    }

    /// Generate an access token
    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        kind: PrincipalKind,
    ) -> AuthResult<String> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            user_id,
            email: email.to_string(),
            kind,
            iat: now,
            nbf: now,
            exp: now + self.access_token_expiry as i64,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .map_err(|e| AuthError::Crypto(format!("failed to sign access token: {e}")))
    }

    /// Generate a refresh token
    pub fn generate_refresh_token(&self, user_id: Uuid, kind: PrincipalKind) -> AuthResult<String> {
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            user_id,
            kind,
            iat: now,
            nbf: now,
            exp: now + self.refresh_token_expiry as i64,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.refresh_encoding,
        )
        .map_err(|e| AuthError::Crypto(format!("failed to sign refresh token: {e}")))
    }

    /// Issue an access/refresh pair for a principal
    pub fn issue_pair(
        &self,
        user_id: Uuid,
        email: &str,
        kind: PrincipalKind,
    ) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.generate_access_token(user_id, email, kind)?,
            refresh_token: self.generate_refresh_token(user_id, kind)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }

    /// Validate an access token and return the claims
    pub fn validate_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        decode::<AccessClaims>(token, &self.access_decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    /// Validate a refresh token and return the claims
    pub fn validate_refresh_token(&self, token: &str) -> AuthResult<RefreshClaims> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    /// Get the access token expiry time
    pub fn access_token_expiry(&self) -> u64 {
        self.access_token_expiry
    }

    /// Get the refresh token expiry time
    pub fn refresh_token_expiry(&self) -> u64 {
        self.refresh_token_expiry
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    debug!("Token rejected: {}", err);
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid(err.to_string()),
    }
}
