//! Order service: creation with stock reservation, status transitions,
//! cancellation and deletion.
//!
//! This is the only place that moves product stock or order status. Every
//! write runs inside one [`OrderTransaction`]; an early return drops the
//! transaction and rolls it back.

use std::collections::HashMap;

use auth::repositories::CustomerRepository;
use chrono::{DateTime, Utc};
use common::{config::OrderNumberStrategy, pagination::Pagination};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use super::OrderNumberGenerator;
use crate::{
    error::{ApiError, ApiResult},
    models::{
        CreateOrderRequest, Order, OrderDetails, OrderItem, OrderStatus, Product,
        UpdateOrderRequest,
    },
    repositories::{OrderItemRepository, OrderRepository, OrderStore, OrderTransaction},
};

pub struct OrderService<S: OrderStore, C: CustomerRepository> {
    store: S,
    customers: C,
    numbers: OrderNumberGenerator,
}

impl<S: OrderStore, C: CustomerRepository> OrderService<S, C> {
    pub fn new(store: S, customers: C, strategy: OrderNumberStrategy) -> Self {
        Self::with_numbers(store, customers, OrderNumberGenerator::new(strategy))
    }

    pub fn with_numbers(store: S, customers: C, numbers: OrderNumberGenerator) -> Self {
        Self {
            store,
            customers,
            numbers,
        }
    }

    /// Validate, price and persist a new order, reserving its stock
    pub async fn create_order(&self, request: CreateOrderRequest) -> ApiResult<OrderDetails> {
        validate_new_order(&request)?;

        let customer = self
            .customers
            .find_by_id(request.customer_id)
            .await?
            .ok_or(ApiError::NotFound("customer"))?;

        let mut tx = self.store.begin().await?;

        let ids: Vec<Uuid> = request.items.iter().map(|line| line.product_id).collect();
        let products: HashMap<Uuid, Product> = tx
            .lock_products(&ids)
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        let order_id = Uuid::new_v4();
        let mut remaining: HashMap<Uuid, i32> = HashMap::new();
        let mut items = Vec::with_capacity(request.items.len());

        for line in &request.items {
            let product = products
                .get(&line.product_id)
                .ok_or(ApiError::NotFound("product"))?;

            if !product.is_active {
                return Err(ApiError::InvalidState(format!(
                    "product {} is not available for sale",
                    product.id
                )));
            }

            let available = remaining
                .entry(product.id)
                .or_insert(product.stock_quantity);
            if *available < line.quantity {
                warn!(
                    "Insufficient stock for product {}: requested {}, available {}",
                    product.id, line.quantity, available
                );
                return Err(ApiError::InsufficientStock {
                    product_id: product.id,
                    requested: line.quantity,
                    available: *available,
                });
            }
            *available -= line.quantity;

            items.push(OrderItem::new(
                order_id,
                product.id,
                line.quantity,
                product.price,
            ));
        }

        let total_amount = items
            .iter()
            .map(|item| item.total_price)
            .sum::<Decimal>()
            .round_dp(2);

        let now = Utc::now();
        let mut order = Order {
            id: order_id,
            customer_id: customer.id,
            order_number: String::new(),
            status: OrderStatus::Pending,
            total_amount,
            shipping_address: request.shipping_address.trim().to_string(),
            billing_address: request.billing_address.trim().to_string(),
            notes: request.notes,
            order_date: now,
            shipped_date: None,
            delivered_date: None,
            created_at: now,
            updated_at: now,
        };

        let mut inserted = false;
        for candidate in self.numbers.candidates() {
            order.order_number = candidate;
            if tx.insert_order(&order).await? {
                inserted = true;
                break;
            }
            warn!("Order number {} is taken, retrying", order.order_number);
        }
        if !inserted {
            return Err(ApiError::AlreadyExists(
                "could not allocate a unique order number".to_string(),
            ));
        }

        for item in &items {
            tx.insert_item(item).await?;
        }

        // The rows are locked, so the guard only trips if the lock was lost
        let mut taken: HashMap<Uuid, i32> = HashMap::new();
        for line in &request.items {
            if !tx.update_stock(line.product_id, -line.quantity).await? {
                let already = taken.get(&line.product_id).copied().unwrap_or(0);
                let available = products
                    .get(&line.product_id)
                    .map_or(0, |p| p.stock_quantity - already);
                return Err(ApiError::InsufficientStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                    available,
                });
            }
            *taken.entry(line.product_id).or_insert(0) += line.quantity;
        }

        tx.commit().await?;

        info!(
            "Created order {} for customer {} totalling {}",
            order.order_number, customer.id, order.total_amount
        );

        Ok(OrderDetails {
            order,
            customer,
            items,
        })
    }

    pub async fn get_order(&self, id: Uuid) -> ApiResult<OrderDetails> {
        let order = OrderRepository::find_by_id(&self.store, id)
            .await?
            .ok_or(ApiError::NotFound("order"))?;
        self.details(order).await
    }

    pub async fn get_order_by_number(&self, order_number: &str) -> ApiResult<OrderDetails> {
        let order = self
            .store
            .find_by_number(order_number)
            .await?
            .ok_or(ApiError::NotFound("order"))?;
        self.details(order).await
    }

    pub async fn list_orders(&self, page: Pagination) -> ApiResult<Vec<Order>> {
        Ok(OrderRepository::list(&self.store, page).await?)
    }

    pub async fn list_orders_by_customer(
        &self,
        customer_id: Uuid,
        page: Pagination,
    ) -> ApiResult<Vec<Order>> {
        Ok(self.store.list_by_customer(customer_id, page).await?)
    }

    pub async fn list_orders_by_status(
        &self,
        status: OrderStatus,
        page: Pagination,
    ) -> ApiResult<Vec<Order>> {
        Ok(self.store.list_by_status(status, page).await?)
    }

    /// Apply a partial update under the order's row lock.
    ///
    /// The total is never recomputed; items are immutable.
    pub async fn update_order(
        &self,
        id: Uuid,
        patch: UpdateOrderRequest,
    ) -> ApiResult<OrderDetails> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(id)
            .await?
            .ok_or(ApiError::NotFound("order"))?;

        if let Some(address) = patch.shipping_address {
            order.shipping_address = required(address, "shipping_address")?;
        }
        if let Some(address) = patch.billing_address {
            order.billing_address = required(address, "billing_address")?;
        }
        if let Some(notes) = patch.notes {
            order.notes = notes;
        }
        if let Some(date) = patch.shipped_date {
            order.shipped_date = Some(date);
        }
        if let Some(date) = patch.delivered_date {
            order.delivered_date = Some(date);
        }

        let now = Utc::now();
        if let Some(status) = patch.status {
            let previous = order.status;
            transition(&mut order, status, now)?;
            if previous != order.status {
                info!("Order {} moved from {} to {}", order.id, previous, order.status);
            }
        }
        order.updated_at = now;

        tx.update_order(&order).await?;
        tx.commit().await?;

        self.details(order).await
    }

    pub async fn update_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> ApiResult<OrderDetails> {
        self.update_order(
            id,
            UpdateOrderRequest {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    /// Cancel a pending or confirmed order and return its stock
    pub async fn cancel_order(&self, id: Uuid) -> ApiResult<OrderDetails> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(id)
            .await?
            .ok_or(ApiError::NotFound("order"))?;

        if !order.status.is_cancellable() {
            return Err(ApiError::InvalidState(format!(
                "order in status {} cannot be cancelled",
                order.status
            )));
        }

        for item in tx.items_for_order(order.id).await? {
            if !tx.update_stock(item.product_id, item.quantity).await? {
                return Err(ApiError::InvalidState(format!(
                    "product {} of order {} no longer exists",
                    item.product_id, order.order_number
                )));
            }
        }

        if !tx.update_status(order.id, OrderStatus::Cancelled).await? {
            return Err(ApiError::NotFound("order"));
        }
        tx.commit().await?;
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();

        info!("Cancelled order {}", order.order_number);
        self.details(order).await
    }

    /// Remove a cancelled order and its items
    pub async fn delete_order(&self, id: Uuid) -> ApiResult<()> {
        let mut tx = self.store.begin().await?;
        let order = tx
            .lock_order(id)
            .await?
            .ok_or(ApiError::NotFound("order"))?;

        if order.status != OrderStatus::Cancelled {
            return Err(ApiError::InvalidState(
                "only cancelled orders can be deleted".to_string(),
            ));
        }

        tx.delete_order(order.id).await?;
        tx.commit().await?;

        info!("Deleted order {}", order.order_number);
        Ok(())
    }

    async fn details(&self, order: Order) -> ApiResult<OrderDetails> {
        let customer = self
            .customers
            .find_by_id(order.customer_id)
            .await?
            .ok_or(ApiError::NotFound("customer"))?;
        let items = self.store.list_by_order(order.id).await?;

        Ok(OrderDetails {
            order,
            customer,
            items,
        })
    }
}

fn validate_new_order(request: &CreateOrderRequest) -> ApiResult<()> {
    if request.items.is_empty() {
        return Err(ApiError::BadRequest(
            "an order needs at least one item".to_string(),
        ));
    }
    if let Some(line) = request.items.iter().find(|line| line.quantity < 1) {
        return Err(ApiError::BadRequest(format!(
            "quantity for product {} must be at least 1",
            line.product_id
        )));
    }
    if request.shipping_address.trim().is_empty() {
        return Err(ApiError::BadRequest("shipping_address is required".to_string()));
    }
    if request.billing_address.trim().is_empty() {
        return Err(ApiError::BadRequest("billing_address is required".to_string()));
    }
    Ok(())
}

fn required(value: String, field: &str) -> ApiResult<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(value)
}

/// Move `order` to `next`, stamping shipment and delivery dates on entry
fn transition(order: &mut Order, next: OrderStatus, now: DateTime<Utc>) -> ApiResult<()> {
    if next == OrderStatus::Cancelled && order.status != OrderStatus::Cancelled {
        return Err(ApiError::InvalidState(
            "orders are cancelled through the cancel operation".to_string(),
        ));
    }
    if !order.status.can_transition_to(next) {
        return Err(ApiError::InvalidState(format!(
            "cannot move order from {} to {}",
            order.status, next
        )));
    }
    if order.status == next {
        return Ok(());
    }

    if matches!(next, OrderStatus::Shipped | OrderStatus::Delivered) && order.shipped_date.is_none()
    {
        order.shipped_date = Some(now);
    }
    if next == OrderStatus::Delivered && order.delivered_date.is_none() {
        order.delivered_date = Some(now);
    }
    order.status = next;
    Ok(())
}
