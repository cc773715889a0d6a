//! Core types for Kramnytsia.
//!
//! Type-safe wrappers and pure state machines for the storefront domain.

pub mod address;
pub mod cart;
pub mod email;
pub mod id;
pub mod money;
pub mod order;
pub mod shipping;
pub mod status;

pub use address::{Address, AddressDraft, AddressError, apply_default};
pub use cart::{Cart, CartChange, CartError, CartItem, MergeOutcome, ProductSnapshot};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Currency, CurrencyError, ExchangeRates, RateSource, format_display};
pub use order::{OrderTotals, to_minor_units};
pub use shipping::{
    REST_OF_WORLD, ShippingQuote, ShippingRate, ShippingRateError, ShippingSelection, ShippingWarning,
    find_rate, normalize_country_code, resolve_shipping, select_tier,
};
pub use status::*;
