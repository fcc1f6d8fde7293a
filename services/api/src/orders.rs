//! Order lifecycle engine

pub mod number;
pub mod service;

pub use number::OrderNumberGenerator;
pub use service::OrderService;
