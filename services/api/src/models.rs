//! API models for request and response payloads

use serde::{Deserialize, Deserializer};

pub mod category;
pub mod order;
pub mod product;

pub use category::{Category, NewCategory, UpdateCategory};
pub use order::{
    CreateOrderRequest, NewOrderLine, Order, OrderDetails, OrderItem, OrderStatus,
    PlaceOrderRequest, UpdateOrderRequest,
};
pub use product::{NewProduct, Product, UpdateProduct};

/// Distinguish an absent field from an explicit `null` in a patch body.
///
/// Used with `#[serde(default)]`: absent stays `None`, `null` becomes
/// `Some(None)`.
pub(crate) fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
