//! Domain models for the back office.

pub mod order;

pub use order::{Order, OrderItem, OrderPage, OrderSummary};
