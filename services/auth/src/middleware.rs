//! Request-time authentication
//!
//! Four per-route modes read the bearer token, validate it as a local
//! access token and/or an OIDC ID token, and attach the resolved principal
//! to the request extensions.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    jwt::{AccessClaims, JwtService, PrincipalKind},
    oidc::{IdTokenClaims, OidcClient},
};

/// Staff principal admitted by a local access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub user_id: Uuid,
    pub email: String,
}

/// Shopper principal.
///
/// `customer_id` is known when a local customer token admitted the
/// request; `subject` when an OIDC ID token did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerInfo {
    pub customer_id: Option<Uuid>,
    pub email: String,
    pub subject: Option<String>,
    pub name: Option<String>,
}

impl From<&IdTokenClaims> for CustomerInfo {
    fn from(claims: &IdTokenClaims) -> Self {
        Self {
            customer_id: None,
            email: claims.email.clone().unwrap_or_default(),
            subject: Some(claims.sub.clone()),
            name: claims.name.clone(),
        }
    }
}

/// Token validators shared by the middleware functions
#[derive(Clone)]
pub struct Authenticator {
    jwt: JwtService,
    oidc: Option<Arc<OidcClient>>,
}

impl Authenticator {
    pub fn new(jwt: JwtService, oidc: Option<Arc<OidcClient>>) -> Self {
        Self { jwt, oidc }
    }

    fn access_claims(&self, token: &str, kind: PrincipalKind) -> AuthResult<AccessClaims> {
        let claims = self.jwt.validate_access_token(token)?;
        if claims.kind != kind {
            return Err(AuthError::TokenInvalid(format!(
                "token was issued for a {:?} principal",
                claims.kind
            )));
        }
        Ok(claims)
    }

    async fn id_token_claims(&self, token: &str) -> AuthResult<IdTokenClaims> {
        match &self.oidc {
            Some(oidc) => oidc.validate_id_token(token).await,
            None => Err(AuthError::TokenInvalid(
                "OIDC tokens are not accepted".to_string(),
            )),
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> AuthResult<&str> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthError::Unauthenticated)?;

    match header.strip_prefix("Bearer ") {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::Unauthenticated),
    }
}

/// Admit only local access tokens issued to a User
pub async fn require_user_auth(
    State(auth): State<Authenticator>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())?;
    let claims = auth.access_claims(token, PrincipalKind::User)?;

    req.extensions_mut().insert(UserInfo {
        user_id: claims.user_id,
        email: claims.email,
    });

    Ok(next.run(req).await)
}

/// Admit a local customer token, falling back to an OIDC ID token
pub async fn require_customer_auth(
    State(auth): State<Authenticator>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())?.to_owned();

    let info = match auth.access_claims(&token, PrincipalKind::Customer) {
        Ok(claims) => CustomerInfo {
            customer_id: Some(claims.user_id),
            email: claims.email,
            subject: None,
            name: None,
        },
        Err(local) => {
            debug!("Not a local customer token ({}), trying OIDC", local);
            let claims = auth.id_token_claims(&token).await?;
            CustomerInfo::from(&claims)
        }
    };

    req.extensions_mut().insert(info);
    Ok(next.run(req).await)
}

/// Admit only OIDC ID tokens
pub async fn require_oidc_auth(
    State(auth): State<Authenticator>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers())?.to_owned();
    let claims = auth.id_token_claims(&token).await?;

    req.extensions_mut().insert(CustomerInfo::from(&claims));
    Ok(next.run(req).await)
}

/// Attach whichever principal the token resolves to; never rejects
pub async fn optional_auth(
    State(auth): State<Authenticator>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = bearer_token(req.headers()).ok().map(str::to_owned);

    if let Some(token) = token {
        match auth.jwt.validate_access_token(&token) {
            Ok(claims) if claims.kind == PrincipalKind::User => {
                req.extensions_mut().insert(UserInfo {
                    user_id: claims.user_id,
                    email: claims.email,
                });
            }
            Ok(claims) => {
                req.extensions_mut().insert(CustomerInfo {
                    customer_id: Some(claims.user_id),
                    email: claims.email,
                    subject: None,
                    name: None,
                });
            }
            Err(_) => {
                if let Ok(claims) = auth.id_token_claims(&token).await {
                    req.extensions_mut().insert(CustomerInfo::from(&claims));
                }
            }
        }
    }

    next.run(req).await
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for UserInfo
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserInfo>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CustomerInfo
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CustomerInfo>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}
