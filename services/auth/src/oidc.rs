//! OpenID Connect client
//!
//! Discovery, the authorization-code flow over `oauth2`, ID token
//! validation against the provider's published JWKS, and userinfo.

use std::time::{Duration, Instant};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use common::config::OidcSettings;
use jsonwebtoken::{
    Algorithm, DecodingKey, Validation, decode, decode_header, errors::ErrorKind, jwk::JwkSet,
};
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken, ExtraTokenFields,
    RedirectUrl, RefreshToken, Scope, StandardRevocableToken, StandardTokenResponse,
    TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
    reqwest::async_http_client,
};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use subtle::ConstantTimeEq;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::{AuthError, AuthResult};

/// Upper bound for every outbound call to the provider
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum spacing between key set refetches triggered by unknown `kid`s
pub const JWKS_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// OIDC client configuration
#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub provider_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
}

impl OidcConfig {
    pub fn from_settings(settings: &OidcSettings) -> Self {
        Self {
            provider_url: settings.provider_url.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_url: settings.redirect_url.clone(),
            scopes: settings.scopes.clone(),
        }
    }
}

/// The subset of the discovery document the client relies on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    pub jwks_uri: String,
}

/// Token endpoint extension carrying the OIDC `id_token`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdTokenField {
    #[serde(default)]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenField {}

type OidcTokenResponse = StandardTokenResponse<IdTokenField, BasicTokenType>;

type OAuthClient = Client<
    BasicErrorResponse,
    OidcTokenResponse,
    BasicTokenType,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Tokens returned by the provider's token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub token_type: String,
}

/// Claims extracted from a validated ID token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    pub iss: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

pub struct OidcClient {
    oauth: OAuthClient,
    http: reqwest::Client,
    metadata: ProviderMetadata,
    client_id: String,
    scopes: Vec<String>,
    jwks: RwLock<JwkSet>,
    /// When an unknown `kid` last caused a refetch; held across the fetch
    last_refresh: Mutex<Option<Instant>>,
}

impl OidcClient {
    /// Fetch the discovery document and signing keys, then build the client
    pub async fn discover(config: OidcConfig) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Provider(format!("failed to build HTTP client: {e}")))?;

        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            config.provider_url.trim_end_matches('/')
        );
        info!("Discovering OIDC provider at {}", discovery_url);

        let metadata: ProviderMetadata = fetch_json(&http, &discovery_url).await?;
        let jwks: JwkSet = fetch_json(&http, &metadata.jwks_uri).await?;

        let client_secret = (!config.client_secret.is_empty())
            .then(|| ClientSecret::new(config.client_secret.clone()));
        let oauth = OAuthClient::new(
            ClientId::new(config.client_id.clone()),
            client_secret,
            AuthUrl::new(metadata.authorization_endpoint.clone())
                .map_err(|e| AuthError::Provider(format!("invalid authorization endpoint: {e}")))?,
            Some(
                TokenUrl::new(metadata.token_endpoint.clone())
                    .map_err(|e| AuthError::Provider(format!("invalid token endpoint: {e}")))?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_url.clone())
                .map_err(|e| AuthError::Provider(format!("invalid redirect url: {e}")))?,
        );

        info!(
            "OIDC provider {} ready with {} signing key(s)",
            metadata.issuer,
            jwks.keys.len()
        );

        Ok(Self {
            oauth,
            http,
            metadata,
            client_id: config.client_id,
            scopes: config.scopes,
            jwks: RwLock::new(jwks),
            last_refresh: Mutex::new(None),
        })
    }

    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    /// Authorization URL carrying `state`, the configured scopes and
    /// offline access so the provider hands out a refresh token
    pub fn auth_url(&self, state: &str) -> String {
        let mut request = self
            .oauth
            .authorize_url(|| CsrfToken::new(state.to_string()));

        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let (url, _) = request.add_extra_param("access_type", "offline").url();
        url.to_string()
    }

    /// Exchange an authorization code at the token endpoint
    pub async fn exchange_code(&self, code: &str) -> AuthResult<OidcTokens> {
        let request = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client);

        let response = tokio::time::timeout(HTTP_TIMEOUT, request)
            .await
            .map_err(|_| AuthError::Provider("token endpoint timed out".to_string()))?
            .map_err(|e| AuthError::Provider(format!("code exchange failed: {e}")))?;

        tokens_from(response)
    }

    /// Use a provider refresh token to obtain a fresh token triple
    pub async fn refresh_token(&self, refresh_token: &str) -> AuthResult<OidcTokens> {
        let refresh_token = RefreshToken::new(refresh_token.to_string());
        let request = self
            .oauth
            .exchange_refresh_token(&refresh_token)
            .request_async(async_http_client);

        let response = tokio::time::timeout(HTTP_TIMEOUT, request)
            .await
            .map_err(|_| AuthError::Provider("token endpoint timed out".to_string()))?
            .map_err(|e| AuthError::Provider(format!("token refresh failed: {e}")))?;

        tokens_from(response)
    }

    /// Verify an ID token's signature, audience, issuer and expiry
    pub async fn validate_id_token(&self, id_token: &str) -> AuthResult<IdTokenClaims> {
        let header = decode_header(id_token)
            .map_err(|e| AuthError::TokenInvalid(format!("malformed id token: {e}")))?;

        if !is_asymmetric(header.alg) {
            return Err(AuthError::TokenInvalid(format!(
                "id token algorithm {:?} is not accepted",
                header.alg
            )));
        }

        let key = self.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&[&self.metadata.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        decode::<IdTokenClaims>(id_token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid(format!("id token rejected: {e}")),
            })
    }

    /// Fetch claims from the discovered userinfo endpoint
    pub async fn user_info(&self, access_token: &str) -> AuthResult<serde_json::Value> {
        let endpoint = self.metadata.userinfo_endpoint.as_deref().ok_or_else(|| {
            AuthError::Provider("provider does not publish a userinfo endpoint".to_string())
        })?;

        let response = self
            .http
            .get(endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("userinfo request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "userinfo endpoint returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("unparseable userinfo response: {e}")))
    }

    async fn decoding_key(&self, kid: Option<&str>) -> AuthResult<DecodingKey> {
        if let Some(key) = self.find_key(kid).await? {
            return Ok(key);
        }

        // Unknown kid: the provider may have rotated its keys. Concurrent
        // misses queue on the lock and share whichever fetch ran first.
        let mut last_refresh = self.last_refresh.lock().await;
        let due = last_refresh.is_none_or(|at| at.elapsed() >= JWKS_REFRESH_INTERVAL);
        if due {
            warn!("No signing key matches kid {:?}, refreshing JWKS", kid);
            *last_refresh = Some(Instant::now());
            let jwks: JwkSet = fetch_json(&self.http, &self.metadata.jwks_uri).await?;
            *self.jwks.write().await = jwks;
        }
        drop(last_refresh);

        self.find_key(kid)
            .await?
            .ok_or_else(|| AuthError::TokenInvalid("no matching signing key".to_string()))
    }

    async fn find_key(&self, kid: Option<&str>) -> AuthResult<Option<DecodingKey>> {
        let jwks = self.jwks.read().await;
        let jwk = match kid {
            Some(kid) => jwks.find(kid),
            None if jwks.keys.len() == 1 => jwks.keys.first(),
            None => None,
        };

        jwk.map(|jwk| {
            DecodingKey::from_jwk(jwk)
                .map_err(|e| AuthError::Provider(format!("unusable signing key: {e}")))
        })
        .transpose()
    }
}

fn tokens_from(response: OidcTokenResponse) -> AuthResult<OidcTokens> {
    let id_token = response
        .extra_fields()
        .id_token
        .clone()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::Provider("token response carried no id_token".to_string()))?;

    let token_type = match response.token_type() {
        BasicTokenType::Bearer => "Bearer".to_string(),
        other => format!("{other:?}"),
    };

    Ok(OidcTokens {
        access_token: response.access_token().secret().clone(),
        refresh_token: response.refresh_token().map(|t| t.secret().clone()),
        id_token,
        expires_at: response
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d),
        token_type,
    })
}

async fn fetch_json<T: DeserializeOwned>(http: &reqwest::Client, url: &str) -> AuthResult<T> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| AuthError::Provider(format!("request to {url} failed: {e}")))?;

    if !response.status().is_success() {
        return Err(AuthError::Provider(format!(
            "{url} returned {}",
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| AuthError::Provider(format!("unparseable response from {url}: {e}")))
}

fn is_asymmetric(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
            | Algorithm::ES256
            | Algorithm::ES384
            | Algorithm::EdDSA
    )
}

/// Random opaque `state`: 32 bytes from the OS CSPRNG, URL-safe base64
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time comparison of the issued and returned `state`
pub fn validate_state(expected: &str, received: &str) -> bool {
    !expected.is_empty() && bool::from(expected.as_bytes().ct_eq(received.as_bytes()))
}
