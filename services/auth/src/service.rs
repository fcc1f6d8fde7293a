//! Authentication service: local login and registration, token refresh,
//! and the OIDC callback with just-in-time customer provisioning.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    accounts::email_conflict,
    error::{AuthError, AuthResult},
    jwt::{AccessClaims, JwtService, PrincipalKind, TokenPair},
    middleware::Authenticator,
    models::{Customer, LoginCredentials, NewCustomer, NewUser, User},
    oidc::{self, IdTokenClaims, OidcClient, OidcTokens},
    password,
    rate_limiter::RateLimiter,
    repositories::{CUSTOMERS_EMAIL_KEY, CustomerRepository, USERS_EMAIL_KEY, UserRepository},
    validation,
};

/// Successful login or registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub tokens: TokenPair,
}

/// Outcome of the OIDC callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcCallbackResult {
    pub tokens: TokenPair,
    pub customer: Customer,
    pub is_new_user: bool,
}

/// Authentication service.
///
/// Generic over repository implementations so that tests can run against
/// the in-memory store.
pub struct AuthService<U: UserRepository, C: CustomerRepository> {
    users: U,
    customers: C,
    jwt: JwtService,
    oidc: Option<Arc<OidcClient>>,
    rate_limiter: RateLimiter,
}

impl<U: UserRepository, C: CustomerRepository> AuthService<U, C> {
    pub fn new(
        users: U,
        customers: C,
        jwt: JwtService,
        oidc: Option<Arc<OidcClient>>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            users,
            customers,
            jwt,
            oidc,
            rate_limiter,
        }
    }

    /// Request authenticator sharing this service's token issuer and OIDC client
    pub fn authenticator(&self) -> Authenticator {
        Authenticator::new(self.jwt.clone(), self.oidc.clone())
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub fn oidc_enabled(&self) -> bool {
        self.oidc.is_some()
    }

    fn oidc(&self) -> AuthResult<&OidcClient> {
        self.oidc.as_deref().ok_or(AuthError::ProviderUnconfigured)
    }

    /// Create a User and issue a token pair for it
    pub async fn register(&self, input: NewUser) -> AuthResult<AuthResponse> {
        let email = validation::normalize_email(&input.email);
        validation::validate_name(&input.name).map_err(AuthError::Validation)?;
        validation::validate_email(&email).map_err(AuthError::Validation)?;
        validation::validate_password(&input.password).map_err(AuthError::Validation)?;

        if self.users.find_by_email(&email).await?.is_some() {
            warn!("Registration rejected, email already in use");
            return Err(AuthError::EmailTaken);
        }

        let password_hash = password::hash_password(&input.password)?;
        let user = User::new(input.name.trim().to_string(), email, password_hash);

        let user = self
            .users
            .create(&user)
            .await
            .map_err(|e| email_conflict(e, USERS_EMAIL_KEY))?;

        info!("Registered user {}", user.id);
        let tokens = self.jwt.issue_pair(user.id, &user.email, PrincipalKind::User)?;
        Ok(AuthResponse { user, tokens })
    }

    /// Verify credentials and issue a token pair.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, credentials: LoginCredentials) -> AuthResult<AuthResponse> {
        let email = validation::normalize_email(&credentials.email);

        if !self.rate_limiter.is_allowed(&email).await {
            warn!("Login throttled for {}", email);
            return Err(AuthError::RateLimited);
        }

        let Some(user) = self.users.find_by_email(&email).await? else {
            password::verify_dummy(&credentials.password);
            return Err(AuthError::InvalidCredentials);
        };

        let valid = password::verify_password(&credentials.password, &user.password_hash)
            .unwrap_or_else(|e| {
                error!("Stored password hash for user {} is unusable: {}", user.id, e);
                false
            });
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        self.rate_limiter.reset(&email).await;
        info!("User {} logged in", user.id);

        let tokens = self.jwt.issue_pair(user.id, &user.email, PrincipalKind::User)?;
        Ok(AuthResponse { user, tokens })
    }

    /// Exchange a refresh token for a fresh pair bound to the same principal
    pub async fn refresh_token(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self.jwt.validate_refresh_token(refresh_token)?;

        let email = match claims.kind {
            PrincipalKind::User => self
                .users
                .find_by_id(claims.user_id)
                .await?
                .map(|user| user.email),
            PrincipalKind::Customer => self
                .customers
                .find_by_id(claims.user_id)
                .await?
                .map(|customer| customer.email),
        }
        .ok_or_else(|| AuthError::TokenInvalid("principal no longer exists".to_string()))?;

        self.jwt.issue_pair(claims.user_id, &email, claims.kind)
    }

    pub fn validate_token(&self, token: &str) -> AuthResult<AccessClaims> {
        self.jwt.validate_access_token(token)
    }

    /// Authorization URL and the freshly generated `state` it embeds
    pub fn oidc_auth_url(&self) -> AuthResult<(String, String)> {
        let client = self.oidc()?;
        let state = oidc::generate_state();
        Ok((client.auth_url(&state), state))
    }

    /// Complete the authorization-code flow.
    ///
    /// The caller has already matched `state` against the value bound to
    /// the user agent; an empty one is rejected here.
    pub async fn handle_oidc_callback(
        &self,
        code: &str,
        state: &str,
    ) -> AuthResult<OidcCallbackResult> {
        let client = self.oidc()?;
        if state.is_empty() {
            return Err(AuthError::StateMismatch);
        }
        if code.is_empty() {
            return Err(AuthError::Validation(
                "authorization code is required".to_string(),
            ));
        }

        let provider_tokens = client.exchange_code(code).await?;
        let claims = client.validate_id_token(&provider_tokens.id_token).await?;

        let (customer, is_new_user) = self.find_or_provision_customer(&claims).await?;
        let tokens = self
            .jwt
            .issue_pair(customer.id, &customer.email, PrincipalKind::Customer)?;

        Ok(OidcCallbackResult {
            tokens,
            customer,
            is_new_user,
        })
    }

    async fn find_or_provision_customer(
        &self,
        claims: &IdTokenClaims,
    ) -> AuthResult<(Customer, bool)> {
        let email = claims
            .email
            .as_deref()
            .map(validation::normalize_email)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| {
                AuthError::Validation("identity provider did not supply an email".to_string())
            })?;

        if let Some(customer) = self.customers.find_by_email(&email).await? {
            return Ok((customer, false));
        }

        let (first_name, last_name) = names_from_claims(claims);
        let customer = Customer::new(NewCustomer {
            first_name,
            last_name,
            email: email.clone(),
            ..Default::default()
        });

        match self.customers.create(&customer).await {
            Ok(customer) => {
                info!(
                    "Provisioned customer {} for subject {}",
                    customer.id, claims.sub
                );
                Ok((customer, true))
            }
            // Lost a provisioning race with a concurrent callback
            Err(e) if e.is_unique_violation_on(CUSTOMERS_EMAIL_KEY) => {
                let customer = self.customers.find_by_email(&email).await?.ok_or_else(|| {
                    AuthError::Store(e)
                })?;
                Ok((customer, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn validate_oidc_token(&self, id_token: &str) -> AuthResult<IdTokenClaims> {
        self.oidc()?.validate_id_token(id_token).await
    }

    pub async fn refresh_oidc_token(&self, refresh_token: &str) -> AuthResult<OidcTokens> {
        self.oidc()?.refresh_token(refresh_token).await
    }

    pub async fn oidc_user_info(&self, access_token: &str) -> AuthResult<serde_json::Value> {
        self.oidc()?.user_info(access_token).await
    }
}

/// First and last name from `given_name`/`family_name`, falling back to
/// splitting `name` on its first space
fn names_from_claims(claims: &IdTokenClaims) -> (String, String) {
    let given = claims.given_name.clone().filter(|s| !s.trim().is_empty());
    let family = claims.family_name.clone().filter(|s| !s.trim().is_empty());

    if given.is_some() || family.is_some() {
        return (given.unwrap_or_default(), family.unwrap_or_default());
    }

    match claims.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => match name.split_once(' ') {
            Some((first, last)) => (first.to_string(), last.trim().to_string()),
            None => (name.to_string(), String::new()),
        },
        _ => (String::new(), String::new()),
    }
}
