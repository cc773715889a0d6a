//! Domain models for the storefront.
//!
//! Validated domain objects, separate from database row types.

pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderSummary};
pub use product::Product;
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
