//! In-memory catalog and order store for tests
//!
//! A transaction holds the store's lock for its whole lifetime and works on
//! a copy of the state, which replaces the shared state on commit.
//! Dropping the transaction discards the copy.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use common::{
    error::{DatabaseError, DatabaseResult},
    pagination::Pagination,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    CATEGORIES_NAME_KEY, CategoryRepository, OrderItemRepository, OrderRepository, OrderStore,
    OrderTransaction, PRODUCTS_SKU_KEY, ProductRepository,
};
use crate::models::{Category, Order, OrderItem, OrderStatus, Product};

#[derive(Clone, Default)]
struct MemoryState {
    categories: HashMap<Uuid, Category>,
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    items: Vec<OrderItem>,
}

impl MemoryState {
    fn adjust_stock(&mut self, id: Uuid, delta: i32) -> bool {
        let Some(product) = self.products.get_mut(&id) else {
            return false;
        };
        match product.stock_quantity.checked_add(delta) {
            Some(stock) if stock >= 0 => {
                product.stock_quantity = stock;
                true
            }
            _ => false,
        }
    }

    fn items_for(&self, order_id: Uuid) -> Vec<OrderItem> {
        self.items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect()
    }

    fn orders_where(&self, page: Pagination, keep: impl Fn(&Order) -> bool) -> Vec<Order> {
        let mut orders: Vec<Order> = self.orders.values().filter(|o| keep(o)).cloned().collect();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        page.apply(orders)
    }
}

/// Shared in-memory store implementing every catalog and order contract
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stock of a product
    pub async fn stock_of(&self, product_id: Uuid) -> Option<i32> {
        let state = self.state.lock().await;
        state.products.get(&product_id).map(|p| p.stock_quantity)
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn item_count(&self) -> usize {
        self.state.lock().await.items.len()
    }
}

impl CategoryRepository for MemoryStore {
    async fn create(&self, category: &Category) -> DatabaseResult<Category> {
        let mut state = self.state.lock().await;
        if state.categories.values().any(|c| c.name == category.name) {
            return Err(DatabaseError::UniqueViolation(CATEGORIES_NAME_KEY.to_string()));
        }
        if let Some(parent_id) = category.parent_id {
            if !state.categories.contains_key(&parent_id) {
                return Err(DatabaseError::ForeignKeyViolation(
                    "categories_parent_id_fkey".to_string(),
                ));
            }
        }
        state.categories.insert(category.id, category.clone());
        Ok(category.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Category>> {
        Ok(self.state.lock().await.categories.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> DatabaseResult<Option<Category>> {
        let state = self.state.lock().await;
        Ok(state.categories.values().find(|c| c.name == name).cloned())
    }

    async fn list(&self, page: Pagination) -> DatabaseResult<Vec<Category>> {
        let mut categories: Vec<Category> =
            self.state.lock().await.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page.apply(categories))
    }

    async fn list_children(&self, parent_id: Uuid) -> DatabaseResult<Vec<Category>> {
        let mut children: Vec<Category> = self
            .state
            .lock()
            .await
            .categories
            .values()
            .filter(|c| c.parent_id == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    async fn update(&self, category: &Category) -> DatabaseResult<Option<Category>> {
        let mut state = self.state.lock().await;
        if state
            .categories
            .values()
            .any(|c| c.id != category.id && c.name == category.name)
        {
            return Err(DatabaseError::UniqueViolation(CATEGORIES_NAME_KEY.to_string()));
        }
        match state.categories.get_mut(&category.id) {
            Some(row) => {
                *row = category.clone();
                Ok(Some(category.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut state = self.state.lock().await;
        let referenced = state.categories.values().any(|c| c.parent_id == Some(id))
            || state.products.values().any(|p| p.category_id == id);
        if referenced {
            return Err(DatabaseError::ForeignKeyViolation(
                "categories_parent_id_fkey".to_string(),
            ));
        }
        Ok(state.categories.remove(&id).is_some())
    }
}

impl ProductRepository for MemoryStore {
    async fn create(&self, product: &Product) -> DatabaseResult<Product> {
        let mut state = self.state.lock().await;
        if state.products.values().any(|p| p.sku == product.sku) {
            return Err(DatabaseError::UniqueViolation(PRODUCTS_SKU_KEY.to_string()));
        }
        if !state.categories.contains_key(&product.category_id) {
            return Err(DatabaseError::ForeignKeyViolation(
                "products_category_id_fkey".to_string(),
            ));
        }
        state.products.insert(product.id, product.clone());
        Ok(product.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn find_by_sku(&self, sku: &str) -> DatabaseResult<Option<Product>> {
        let state = self.state.lock().await;
        Ok(state.products.values().find(|p| p.sku == sku).cloned())
    }

    async fn list(&self, page: Pagination) -> DatabaseResult<Vec<Product>> {
        let mut products: Vec<Product> =
            self.state.lock().await.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page.apply(products))
    }

    async fn list_by_category(
        &self,
        category_id: Uuid,
        page: Pagination,
    ) -> DatabaseResult<Vec<Product>> {
        let mut products: Vec<Product> = self
            .state
            .lock()
            .await
            .products
            .values()
            .filter(|p| p.category_id == category_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(page.apply(products))
    }

    async fn update(&self, product: &Product) -> DatabaseResult<Option<Product>> {
        let mut state = self.state.lock().await;
        if state
            .products
            .values()
            .any(|p| p.id != product.id && p.sku == product.sku)
        {
            return Err(DatabaseError::UniqueViolation(PRODUCTS_SKU_KEY.to_string()));
        }
        if !state.categories.contains_key(&product.category_id) {
            return Err(DatabaseError::ForeignKeyViolation(
                "products_category_id_fkey".to_string(),
            ));
        }
        match state.products.get_mut(&product.id) {
            Some(row) => {
                let stock = row.stock_quantity;
                *row = Product {
                    stock_quantity: stock,
                    ..product.clone()
                };
                Ok(Some(row.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_stock(&self, id: Uuid, delta: i32) -> DatabaseResult<bool> {
        Ok(self.state.lock().await.adjust_stock(id, delta))
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut state = self.state.lock().await;
        if state.items.iter().any(|item| item.product_id == id) {
            return Err(DatabaseError::ForeignKeyViolation(
                "order_items_product_id_fkey".to_string(),
            ));
        }
        Ok(state.products.remove(&id).is_some())
    }
}

impl OrderRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn find_by_number(&self, order_number: &str) -> DatabaseResult<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn list(&self, page: Pagination) -> DatabaseResult<Vec<Order>> {
        Ok(self.state.lock().await.orders_where(page, |_| true))
    }

    async fn list_by_customer(
        &self,
        customer_id: Uuid,
        page: Pagination,
    ) -> DatabaseResult<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders_where(page, |o| o.customer_id == customer_id))
    }

    async fn list_by_status(
        &self,
        status: OrderStatus,
        page: Pagination,
    ) -> DatabaseResult<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders_where(page, |o| o.status == status))
    }
}

impl OrderItemRepository for MemoryStore {
    async fn find_item(&self, id: Uuid) -> DatabaseResult<Option<OrderItem>> {
        let state = self.state.lock().await;
        Ok(state.items.iter().find(|item| item.id == id).cloned())
    }

    async fn list_by_order(&self, order_id: Uuid) -> DatabaseResult<Vec<OrderItem>> {
        Ok(self.state.lock().await.items_for(order_id))
    }
}

impl OrderStore for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin(&self) -> DatabaseResult<MemoryTransaction> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTransaction { guard, working })
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl OrderTransaction for MemoryTransaction {
    async fn lock_products(&mut self, ids: &[Uuid]) -> DatabaseResult<Vec<Product>> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(ids
            .iter()
            .filter_map(|id| self.working.products.get(id).cloned())
            .collect())
    }

    async fn update_stock(&mut self, product_id: Uuid, delta: i32) -> DatabaseResult<bool> {
        Ok(self.working.adjust_stock(product_id, delta))
    }

    async fn insert_order(&mut self, order: &Order) -> DatabaseResult<bool> {
        if self
            .working
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Ok(false);
        }
        if self.working.orders.contains_key(&order.id) {
            return Err(DatabaseError::UniqueViolation("orders_pkey".to_string()));
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(true)
    }

    async fn insert_item(&mut self, item: &OrderItem) -> DatabaseResult<()> {
        if !self.working.orders.contains_key(&item.order_id) {
            return Err(DatabaseError::ForeignKeyViolation(
                "order_items_order_id_fkey".to_string(),
            ));
        }
        self.working.items.push(item.clone());
        Ok(())
    }

    async fn lock_order(&mut self, id: Uuid) -> DatabaseResult<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn items_for_order(&mut self, order_id: Uuid) -> DatabaseResult<Vec<OrderItem>> {
        Ok(self.working.items_for(order_id))
    }

    async fn update_order(&mut self, order: &Order) -> DatabaseResult<()> {
        if let Some(row) = self.working.orders.get_mut(&order.id) {
            *row = order.clone();
        }
        Ok(())
    }

    async fn update_status(&mut self, id: Uuid, status: OrderStatus) -> DatabaseResult<bool> {
        match self.working.orders.get_mut(&id) {
            Some(order) => {
                order.status = status;
                order.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_order(&mut self, id: Uuid) -> DatabaseResult<bool> {
        let removed = self.working.orders.remove(&id).is_some();
        if removed {
            self.working.items.retain(|item| item.order_id != id);
        }
        Ok(removed)
    }

    async fn commit(self) -> DatabaseResult<()> {
        let MemoryTransaction { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}
