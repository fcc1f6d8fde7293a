//! Authentication and account routes

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use common::pagination::Pagination;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    accounts::AccountService,
    error::{AuthError, AuthResult},
    jwt::TokenPair,
    middleware::{
        Authenticator, CustomerInfo, UserInfo, bearer_token, require_customer_auth,
        require_oidc_auth, require_user_auth,
    },
    models::{Customer, LoginCredentials, NewCustomer, NewUser, UpdateCustomer, UpdateUser, User},
    oidc::{self, OidcTokens},
    repositories::{CustomerRepository, UserRepository},
    service::{AuthResponse, AuthService, OidcCallbackResult},
};

/// Cookie binding the OIDC `state` to the user agent
pub const OIDC_STATE_COOKIE: &str = "oidc_state";
const OIDC_COOKIE_PATH: &str = "/auth/oidc";

/// Shared state for the auth routes
pub struct AuthState<U: UserRepository, C: CustomerRepository> {
    pub auth: Arc<AuthService<U, C>>,
    pub accounts: Arc<AccountService<U, C>>,
    pub authenticator: Authenticator,
}

impl<U: UserRepository, C: CustomerRepository> Clone for AuthState<U, C> {
    fn clone(&self) -> Self {
        Self {
            auth: self.auth.clone(),
            accounts: self.accounts.clone(),
            authenticator: self.authenticator.clone(),
        }
    }
}

impl<U: UserRepository, C: CustomerRepository> AuthState<U, C> {
    pub fn new(auth: AuthService<U, C>, accounts: AccountService<U, C>) -> Self {
        let authenticator = auth.authenticator();
        Self {
            auth: Arc::new(auth),
            accounts: Arc::new(accounts),
            authenticator,
        }
    }
}

/// Request for token refresh
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Response of the authorize endpoint
#[derive(Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub auth_url: String,
    pub state: String,
}

/// Query string the provider redirects back with
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Create the router for the authentication and account routes
pub fn create_router<U: UserRepository, C: CustomerRepository>(state: AuthState<U, C>) -> Router {
    let public = Router::new()
        .route("/auth/register", post(register::<U, C>))
        .route("/auth/login", post(login::<U, C>))
        .route("/auth/refresh", post(refresh_token::<U, C>))
        .route("/auth/logout", post(logout))
        .route("/auth/oidc/authorize", get(oidc_authorize::<U, C>))
        .route("/auth/oidc/callback", get(oidc_callback::<U, C>))
        .route("/auth/oidc/refresh", post(oidc_refresh::<U, C>))
        .route("/auth/oidc/userinfo", get(oidc_userinfo::<U, C>));

    let staff = Router::new()
        .route("/auth/me", get(me::<U, C>))
        .route(
            "/users/me",
            get(me::<U, C>)
                .put(update_me::<U, C>)
                .delete(delete_me::<U, C>),
        )
        .route("/users", get(list_users::<U, C>))
        .route("/users/:id", get(get_user::<U, C>))
        .route(
            "/customers",
            post(create_customer::<U, C>).get(list_customers::<U, C>),
        )
        .route(
            "/customers/:id",
            get(get_customer::<U, C>)
                .put(update_customer::<U, C>)
                .delete(delete_customer::<U, C>),
        )
        .route_layer(from_fn_with_state(
            state.authenticator.clone(),
            require_user_auth,
        ));

    let customer = Router::new()
        .route(
            "/customers/me",
            get(get_own_profile::<U, C>).put(update_own_profile::<U, C>),
        )
        .route_layer(from_fn_with_state(
            state.authenticator.clone(),
            require_customer_auth,
        ));

    let oidc_only = Router::new()
        .route("/auth/oidc/validate", get(oidc_validate))
        .route_layer(from_fn_with_state(
            state.authenticator.clone(),
            require_oidc_auth,
        ));

    Router::new()
        .merge(public)
        .merge(staff)
        .merge(customer)
        .merge(oidc_only)
        .with_state(state)
}

/// User registration endpoint
pub async fn register<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    Json(payload): Json<NewUser>,
) -> AuthResult<impl IntoResponse> {
    let response = state.auth.register(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// User login endpoint
pub async fn login<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    Json(payload): Json<LoginCredentials>,
) -> AuthResult<Json<AuthResponse>> {
    info!("Login attempt");
    Ok(Json(state.auth.login(payload).await?))
}

/// Refresh token endpoint
pub async fn refresh_token<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AuthResult<Json<TokenPair>> {
    Ok(Json(state.auth.refresh_token(&payload.refresh_token).await?))
}

/// Logout endpoint; tokens simply expire
pub async fn logout() -> impl IntoResponse {
    Json(serde_json::json!({"message": "Logged out successfully"}))
}

pub async fn me<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    user: UserInfo,
) -> AuthResult<Json<User>> {
    Ok(Json(state.accounts.get_user(user.user_id).await?))
}

pub async fn update_me<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    user: UserInfo,
    Json(patch): Json<UpdateUser>,
) -> AuthResult<Json<User>> {
    Ok(Json(state.accounts.update_user(user.user_id, patch).await?))
}

pub async fn delete_me<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    user: UserInfo,
) -> AuthResult<StatusCode> {
    state.accounts.delete_user(user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_users<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    Query(page): Query<Pagination>,
) -> AuthResult<Json<Vec<User>>> {
    Ok(Json(state.accounts.list_users(page).await?))
}

pub async fn get_user<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    Path(id): Path<Uuid>,
) -> AuthResult<Json<User>> {
    Ok(Json(state.accounts.get_user(id).await?))
}

pub async fn create_customer<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    Json(payload): Json<NewCustomer>,
) -> AuthResult<impl IntoResponse> {
    let customer = state.accounts.create_customer(payload).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn list_customers<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    Query(page): Query<Pagination>,
) -> AuthResult<Json<Vec<Customer>>> {
    Ok(Json(state.accounts.list_customers(page).await?))
}

pub async fn get_customer<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    Path(id): Path<Uuid>,
) -> AuthResult<Json<Customer>> {
    Ok(Json(state.accounts.get_customer(id).await?))
}

pub async fn update_customer<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateCustomer>,
) -> AuthResult<Json<Customer>> {
    Ok(Json(state.accounts.update_customer(id, patch).await?))
}

pub async fn delete_customer<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    Path(id): Path<Uuid>,
) -> AuthResult<StatusCode> {
    state.accounts.delete_customer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Resolve the calling customer's row from whichever credential admitted it
pub async fn resolve_customer<U: UserRepository, C: CustomerRepository>(
    accounts: &AccountService<U, C>,
    principal: &CustomerInfo,
) -> AuthResult<Customer> {
    match principal.customer_id {
        Some(id) => accounts.get_customer(id).await,
        None if !principal.email.is_empty() => accounts.get_customer_by_email(&principal.email).await,
        None => Err(AuthError::NotFound("customer")),
    }
}

pub async fn get_own_profile<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    principal: CustomerInfo,
) -> AuthResult<Json<Customer>> {
    Ok(Json(resolve_customer(&state.accounts, &principal).await?))
}

pub async fn update_own_profile<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    principal: CustomerInfo,
    Json(patch): Json<UpdateCustomer>,
) -> AuthResult<Json<Customer>> {
    let customer = resolve_customer(&state.accounts, &principal).await?;
    Ok(Json(state.accounts.update_customer(customer.id, patch).await?))
}

/// Start the authorization-code flow and bind `state` to the user agent
pub async fn oidc_authorize<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    jar: CookieJar,
) -> AuthResult<(CookieJar, Json<AuthorizeResponse>)> {
    let (auth_url, oidc_state) = state.auth.oidc_auth_url()?;

    let cookie = Cookie::build((OIDC_STATE_COOKIE, oidc_state.clone()))
        .path(OIDC_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((
        jar.add(cookie),
        Json(AuthorizeResponse {
            auth_url,
            state: oidc_state,
        }),
    ))
}

/// Provider redirect target
pub async fn oidc_callback<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> AuthResult<(CookieJar, Json<OidcCallbackResult>)> {
    if !state.auth.oidc_enabled() {
        return Err(AuthError::ProviderUnconfigured);
    }

    if let Some(error) = params.error {
        warn!("Provider denied authorization: {}", error);
        return Err(AuthError::AuthorizationDenied(
            params.error_description.unwrap_or(error),
        ));
    }

    let returned_state = params.state.unwrap_or_default();
    let expected_state = jar
        .get(OIDC_STATE_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .unwrap_or_default();

    if !oidc::validate_state(&expected_state, &returned_state) {
        warn!("OIDC callback state does not match the issued state");
        return Err(AuthError::StateMismatch);
    }

    let code = params.code.unwrap_or_default();
    let result = state
        .auth
        .handle_oidc_callback(&code, &returned_state)
        .await?;

    let jar = jar.remove(Cookie::build(OIDC_STATE_COOKIE).path(OIDC_COOKIE_PATH));
    Ok((jar, Json(result)))
}

pub async fn oidc_refresh<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AuthResult<Json<OidcTokens>> {
    Ok(Json(
        state.auth.refresh_oidc_token(&payload.refresh_token).await?,
    ))
}

/// Echo the principal an ID token resolves to
pub async fn oidc_validate(principal: CustomerInfo) -> Json<CustomerInfo> {
    Json(principal)
}

/// Proxy the provider's userinfo endpoint for a provider access token
pub async fn oidc_userinfo<U: UserRepository, C: CustomerRepository>(
    State(state): State<AuthState<U, C>>,
    headers: HeaderMap,
) -> AuthResult<Json<serde_json::Value>> {
    let token = bearer_token(&headers)?.to_owned();
    Ok(Json(state.auth.oidc_user_info(&token).await?))
}
