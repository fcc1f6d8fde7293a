//! Repositories for catalog and order persistence
//!
//! Catalog entities are plain repositories. Orders additionally expose a
//! unit of work ([`OrderStore`]) so the order engine can lock rows, move
//! stock and write the order inside one transaction.

use common::{error::DatabaseResult, pagination::Pagination};
use uuid::Uuid;

use crate::models::{Category, Order, OrderItem, OrderStatus, Product};

pub mod category;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod order;
pub mod product;

pub use category::PgCategoryRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;
pub use order::PgOrderRepository;
pub use product::PgProductRepository;

pub const CATEGORIES_NAME_KEY: &str = "categories_name_key";
pub const PRODUCTS_SKU_KEY: &str = "products_sku_key";
pub const ORDERS_NUMBER_KEY: &str = "orders_order_number_key";

pub trait CategoryRepository: Clone + Send + Sync + 'static {
    fn create(&self, category: &Category) -> impl Future<Output = DatabaseResult<Category>> + Send;
    fn find_by_id(&self, id: Uuid)
    -> impl Future<Output = DatabaseResult<Option<Category>>> + Send;
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = DatabaseResult<Option<Category>>> + Send;
    /// Name ascending
    fn list(&self, page: Pagination) -> impl Future<Output = DatabaseResult<Vec<Category>>> + Send;
    fn list_children(
        &self,
        parent_id: Uuid,
    ) -> impl Future<Output = DatabaseResult<Vec<Category>>> + Send;
    fn update(
        &self,
        category: &Category,
    ) -> impl Future<Output = DatabaseResult<Option<Category>>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = DatabaseResult<bool>> + Send;
}

pub trait ProductRepository: Clone + Send + Sync + 'static {
    fn create(&self, product: &Product) -> impl Future<Output = DatabaseResult<Product>> + Send;
    fn find_by_id(&self, id: Uuid) -> impl Future<Output = DatabaseResult<Option<Product>>> + Send;
    fn find_by_sku(&self, sku: &str)
    -> impl Future<Output = DatabaseResult<Option<Product>>> + Send;
    /// Name ascending
    fn list(&self, page: Pagination) -> impl Future<Output = DatabaseResult<Vec<Product>>> + Send;
    fn list_by_category(
        &self,
        category_id: Uuid,
        page: Pagination,
    ) -> impl Future<Output = DatabaseResult<Vec<Product>>> + Send;
    /// Replace every column except the stock counter
    fn update(&self, product: &Product)
    -> impl Future<Output = DatabaseResult<Option<Product>>> + Send;
    /// Add `delta` to the stock unless the result would go negative.
    ///
    /// Returns false when the product is missing or the guard refused.
    fn update_stock(&self, id: Uuid, delta: i32)
    -> impl Future<Output = DatabaseResult<bool>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = DatabaseResult<bool>> + Send;
}

pub trait OrderRepository: Clone + Send + Sync + 'static {
    fn find_by_id(&self, id: Uuid) -> impl Future<Output = DatabaseResult<Option<Order>>> + Send;
    fn find_by_number(
        &self,
        order_number: &str,
    ) -> impl Future<Output = DatabaseResult<Option<Order>>> + Send;
    /// Order date descending, as are the filtered lists
    fn list(&self, page: Pagination) -> impl Future<Output = DatabaseResult<Vec<Order>>> + Send;
    fn list_by_customer(
        &self,
        customer_id: Uuid,
        page: Pagination,
    ) -> impl Future<Output = DatabaseResult<Vec<Order>>> + Send;
    fn list_by_status(
        &self,
        status: OrderStatus,
        page: Pagination,
    ) -> impl Future<Output = DatabaseResult<Vec<Order>>> + Send;
}

pub trait OrderItemRepository: Clone + Send + Sync + 'static {
    fn find_item(&self, id: Uuid) -> impl Future<Output = DatabaseResult<Option<OrderItem>>> + Send;
    /// Insertion order
    fn list_by_order(
        &self,
        order_id: Uuid,
    ) -> impl Future<Output = DatabaseResult<Vec<OrderItem>>> + Send;
}

/// Transactional access to orders and the stock they hold
pub trait OrderStore: OrderRepository + OrderItemRepository {
    type Tx: OrderTransaction;

    fn begin(&self) -> impl Future<Output = DatabaseResult<Self::Tx>> + Send;
}

/// An open transaction. Dropping it without [`commit`](Self::commit)
/// discards every write made through it.
pub trait OrderTransaction: Send {
    /// Lock the given products for the rest of the transaction.
    ///
    /// Rows are locked in ascending id order; missing ids are skipped.
    fn lock_products(
        &mut self,
        ids: &[Uuid],
    ) -> impl Future<Output = DatabaseResult<Vec<Product>>> + Send;
    /// Conditional stock adjustment, see [`ProductRepository::update_stock`]
    fn update_stock(
        &mut self,
        product_id: Uuid,
        delta: i32,
    ) -> impl Future<Output = DatabaseResult<bool>> + Send;
    /// Insert the order; false when its number is already taken.
    ///
    /// A refused insert leaves the transaction usable.
    fn insert_order(&mut self, order: &Order) -> impl Future<Output = DatabaseResult<bool>> + Send;
    fn insert_item(&mut self, item: &OrderItem) -> impl Future<Output = DatabaseResult<()>> + Send;
    /// Load and lock an order row
    fn lock_order(&mut self, id: Uuid)
    -> impl Future<Output = DatabaseResult<Option<Order>>> + Send;
    fn items_for_order(
        &mut self,
        order_id: Uuid,
    ) -> impl Future<Output = DatabaseResult<Vec<OrderItem>>> + Send;
    fn update_order(&mut self, order: &Order) -> impl Future<Output = DatabaseResult<()>> + Send;
    /// Set only the status column; false when the order is missing
    fn update_status(
        &mut self,
        id: Uuid,
        status: OrderStatus,
    ) -> impl Future<Output = DatabaseResult<bool>> + Send;
    /// Delete an order together with its items
    fn delete_order(&mut self, id: Uuid) -> impl Future<Output = DatabaseResult<bool>> + Send;
    fn commit(self) -> impl Future<Output = DatabaseResult<()>> + Send;
}
