//! Kramnytsia Core - domain types and checkout rules.
//!
//! This crate is shared by every Kramnytsia component:
//! - `storefront` - Public JSON API (catalog, cart, checkout, payments)
//! - `admin` - Back-office API (dashboard, order edits, shipping rates)
//! - `cli` - Migrations and data management
//!
//! # Architecture
//!
//! Everything here is pure: no I/O, no database access, no HTTP clients.
//! Rules that must hold regardless of where state is stored (stock ceilings,
//! shipping fallback, currency rounding, status transitions) live here so
//! they can be tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, money, statuses, cart, shipping, orders

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
