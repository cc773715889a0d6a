//! Kramnytsia admin library.
//!
//! Back-office API over the storefront's order and shipping tables,
//! exposed as a library so it can be tested and reused.
//!
//! # Security
//!
//! This crate can rewrite order statuses and shipping prices. Bind it to an
//! internal interface only; every API request needs the admin bearer token.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
