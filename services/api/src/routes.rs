//! API service routes

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post, put},
};
use auth::{
    CustomerInfo,
    middleware::{optional_auth, require_customer_auth, require_user_auth},
    models::Customer,
    routes::resolve_customer,
};
use common::pagination::Pagination;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{
        Category, CreateOrderRequest, NewCategory, NewProduct, Order, OrderDetails, OrderStatus,
        PlaceOrderRequest, Product, UpdateCategory, UpdateOrderRequest, UpdateProduct,
    },
    notifications::{self, Notification, NotificationReceipt},
    state::{AppState, Backend},
};

/// Body of `PUT /orders/:id/status`
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

/// Create the router for the API service, including the auth routes
pub fn create_router<B: Backend>(state: AppState<B>) -> Router {
    let authenticator = state.auth.authenticator.clone();

    let catalog_reads = Router::new()
        .route("/categories", get(list_categories::<B>))
        .route("/categories/:id", get(get_category::<B>))
        .route("/categories/:id/children", get(list_children::<B>))
        .route("/categories/:id/products", get(list_category_products::<B>))
        .route("/products", get(list_products::<B>))
        .route("/products/:id", get(get_product::<B>))
        .route("/products/sku/:sku", get(get_product_by_sku::<B>))
        .route_layer(from_fn_with_state(authenticator.clone(), optional_auth));

    let staff = Router::new()
        .route("/categories", post(create_category::<B>))
        .route(
            "/categories/:id",
            put(update_category::<B>).delete(delete_category::<B>),
        )
        .route("/products", post(create_product::<B>))
        .route(
            "/products/:id",
            put(update_product::<B>).delete(delete_product::<B>),
        )
        .route("/orders", post(create_order::<B>).get(list_orders::<B>))
        .route(
            "/orders/:id",
            get(get_order::<B>)
                .put(update_order::<B>)
                .delete(delete_order::<B>),
        )
        .route("/orders/:id/status", put(update_order_status::<B>))
        .route("/orders/:id/cancel", post(cancel_order::<B>))
        .route("/orders/number/:order_number", get(get_order_by_number::<B>))
        .route("/orders/status/:status", get(list_orders_by_status::<B>))
        .route("/customers/:id/orders", get(list_customer_orders::<B>))
        .route("/notifications", post(send_notification::<B>))
        .route_layer(from_fn_with_state(authenticator.clone(), require_user_auth));

    let customer = Router::new()
        .route("/me/orders", post(place_order::<B>).get(list_my_orders::<B>))
        .route("/me/orders/:id", get(get_my_order::<B>))
        .route("/me/orders/:id/cancel", post(cancel_my_order::<B>))
        .route_layer(from_fn_with_state(authenticator, require_customer_auth));

    let api = Router::new()
        .route("/health", get(health_check::<B>))
        .merge(catalog_reads)
        .merge(staff)
        .merge(customer)
        .with_state(state.clone());

    api.merge(auth::routes::create_router(state.auth))
}

/// Health check endpoint
pub async fn health_check<B: Backend>(State(state): State<AppState<B>>) -> impl IntoResponse {
    let database = match &state.db_pool {
        Some(pool) => match common::database::health_check(pool).await {
            Ok(true) => "up",
            _ => "down",
        },
        None => "not configured",
    };

    let status = if database == "down" {
        warn!("Health check failed: database unreachable");
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "service": "api",
            "database": database,
        })),
    )
}

pub async fn list_categories<B: Backend>(
    State(state): State<AppState<B>>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.catalog.list_categories(page).await?))
}

pub async fn get_category<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Category>> {
    Ok(Json(state.catalog.get_category(id).await?))
}

pub async fn list_children<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.catalog.list_children(id).await?))
}

pub async fn list_category_products<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.catalog.list_products_by_category(id, page).await?))
}

pub async fn create_category<B: Backend>(
    State(state): State<AppState<B>>,
    Json(payload): Json<NewCategory>,
) -> ApiResult<impl IntoResponse> {
    let category = state.catalog.create_category(payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateCategory>,
) -> ApiResult<Json<Category>> {
    Ok(Json(state.catalog.update_category(id, patch).await?))
}

pub async fn delete_category<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_products<B: Backend>(
    State(state): State<AppState<B>>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.catalog.list_products(page).await?))
}

pub async fn get_product<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.catalog.get_product(id).await?))
}

pub async fn get_product_by_sku<B: Backend>(
    State(state): State<AppState<B>>,
    Path(sku): Path<String>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.catalog.get_product_by_sku(&sku).await?))
}

pub async fn create_product<B: Backend>(
    State(state): State<AppState<B>>,
    Json(payload): Json<NewProduct>,
) -> ApiResult<impl IntoResponse> {
    let product = state.catalog.create_product(payload).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateProduct>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.catalog.update_product(id, patch).await?))
}

pub async fn delete_product<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_order<B: Backend>(
    State(state): State<AppState<B>>,
    Json(payload): Json<CreateOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    let order = state.orders.create_order(payload).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders<B: Backend>(
    State(state): State<AppState<B>>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.orders.list_orders(page).await?))
}

pub async fn get_order<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderDetails>> {
    Ok(Json(state.orders.get_order(id).await?))
}

pub async fn get_order_by_number<B: Backend>(
    State(state): State<AppState<B>>,
    Path(order_number): Path<String>,
) -> ApiResult<Json<OrderDetails>> {
    Ok(Json(state.orders.get_order_by_number(&order_number).await?))
}

pub async fn update_order<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateOrderRequest>,
) -> ApiResult<Json<OrderDetails>> {
    Ok(Json(state.orders.update_order(id, patch).await?))
}

pub async fn update_order_status<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdate>,
) -> ApiResult<Json<OrderDetails>> {
    let status = parse_status(&payload.status)?;
    Ok(Json(state.orders.update_order_status(id, status).await?))
}

pub async fn cancel_order<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderDetails>> {
    Ok(Json(state.orders.cancel_order(id).await?))
}

pub async fn delete_order<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.orders.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_orders_by_status<B: Backend>(
    State(state): State<AppState<B>>,
    Path(status): Path<String>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Order>>> {
    let status = parse_status(&status)?;
    Ok(Json(state.orders.list_orders_by_status(status, page).await?))
}

pub async fn list_customer_orders<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Order>>> {
    state.auth.accounts.get_customer(id).await?;
    Ok(Json(state.orders.list_orders_by_customer(id, page).await?))
}

pub async fn send_notification<B: Backend>(
    State(state): State<AppState<B>>,
    Json(notification): Json<Notification>,
) -> ApiResult<impl IntoResponse> {
    let receipt: NotificationReceipt =
        notifications::dispatch(&state.notifier, notification).await?;
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

pub async fn place_order<B: Backend>(
    State(state): State<AppState<B>>,
    principal: CustomerInfo,
    Json(payload): Json<PlaceOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    let customer = current_customer(&state, &principal).await?;
    let order = state
        .orders
        .create_order(payload.for_customer(customer.id))
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_my_orders<B: Backend>(
    State(state): State<AppState<B>>,
    principal: CustomerInfo,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Order>>> {
    let customer = current_customer(&state, &principal).await?;
    Ok(Json(
        state.orders.list_orders_by_customer(customer.id, page).await?,
    ))
}

pub async fn get_my_order<B: Backend>(
    State(state): State<AppState<B>>,
    principal: CustomerInfo,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderDetails>> {
    let customer = current_customer(&state, &principal).await?;
    Ok(Json(owned_order(&state, customer.id, id).await?))
}

pub async fn cancel_my_order<B: Backend>(
    State(state): State<AppState<B>>,
    principal: CustomerInfo,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderDetails>> {
    let customer = current_customer(&state, &principal).await?;
    owned_order(&state, customer.id, id).await?;
    Ok(Json(state.orders.cancel_order(id).await?))
}

async fn current_customer<B: Backend>(
    state: &AppState<B>,
    principal: &CustomerInfo,
) -> ApiResult<Customer> {
    Ok(resolve_customer(&state.auth.accounts, principal).await?)
}

/// Another customer's order is reported as missing
async fn owned_order<B: Backend>(
    state: &AppState<B>,
    customer_id: Uuid,
    order_id: Uuid,
) -> ApiResult<OrderDetails> {
    let details = state.orders.get_order(order_id).await?;
    if details.order.customer_id != customer_id {
        return Err(ApiError::NotFound("order"));
    }
    Ok(details)
}

fn parse_status(raw: &str) -> ApiResult<OrderStatus> {
    raw.parse().map_err(ApiError::BadRequest)
}
