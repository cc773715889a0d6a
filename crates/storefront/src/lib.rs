//! Kramnytsia storefront library.
//!
//! Cart and wishlist sync, pricing, checkout and payment reconciliation for
//! the public storefront. Exposed as a library so the binary and the
//! integration tests share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;
