//! HTTP middleware for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Bearer-token check, per handler via [`RequireAdminAuth`]

pub mod auth;

pub use auth::RequireAdminAuth;
