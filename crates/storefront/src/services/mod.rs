//! Business logic services for the storefront.
//!
//! - `auth` - password accounts
//! - `cart` - cart/wishlist actions and background remote sync
//! - `checkout` - order submission pipeline
//! - `orders` - persistence seam for the payment pipeline
//! - `rates` - exchange-rate table
//! - `reconciliation` - payment callbacks and captures
//! - `shipping` - cached shipping settings

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod rates;
pub mod reconciliation;
pub mod shipping;

pub use auth::{AuthError, AuthService};
pub use cart::{CartRemote, CartStore, RetryPolicy, SyncStatus};
pub use checkout::{CheckoutError, CheckoutOutcome, CheckoutRequest, CheckoutService};
pub use orders::OrderStore;
pub use rates::ExchangeRateService;
pub use reconciliation::{ReconcileError, ReconciliationService};
pub use shipping::ShippingCatalog;
